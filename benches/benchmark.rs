use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::{Path, PathBuf};
use std::time::Duration;
use web_capture::{
    derive_identifier, format_duration, normalize, validate_url, BackendKind, CaptureResult,
    CaptureStatus, ReportGenerator, ResultAggregator, TargetNormalizer,
};

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

const TARGETS: [&str; 5] = [
    "example.com",
    "https://example.com/path?query=1&other=2",
    "HTTP://Example.com",
    "sub.domain.example.org:8080/a/b/c",
    "bad_target",
];

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    configure_fast_group(&mut group);

    group.bench_function("single", |b| {
        b.iter(|| {
            for raw in TARGETS {
                let _ = black_box(normalize(black_box(raw)));
            }
        });
    });

    let lines: Vec<String> = (0..200)
        .map(|i| format!("site{}.example.com/page?id={}", i % 50, i))
        .collect();
    group.bench_function("batch_with_collisions", |b| {
        b.iter(|| {
            let targets =
                TargetNormalizer::new(true).normalize_lines(lines.iter().map(String::as_str));
            black_box(targets);
        });
    });

    group.finish();
}

fn benchmark_identifier_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifier");
    configure_fast_group(&mut group);

    group.bench_function("derive", |b| {
        b.iter(|| {
            for raw in TARGETS {
                black_box(derive_identifier(black_box(raw)));
            }
        });
    });

    group.bench_function("validate_url", |b| {
        b.iter(|| {
            for raw in TARGETS {
                let _ = black_box(validate_url(black_box(raw)));
            }
        });
    });

    group.finish();
}

fn benchmark_report_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("report");
    configure_fast_group(&mut group);

    let mut aggregator = ResultAggregator::with_capacity(100);
    for i in 0..100 {
        let Ok(target) = normalize(&format!("site{i}.example.com")) else {
            continue;
        };
        let dir = PathBuf::from(target.identifier());
        let status = if i % 4 == 0 {
            CaptureStatus::Failed {
                backend: Some(BackendKind::Full),
                reason: "Timeout after 15s".to_string(),
            }
        } else {
            CaptureStatus::Captured {
                backend: BackendKind::Fast,
            }
        };
        aggregator.add(CaptureResult {
            screenshot_path: dir.join("screenshot.png"),
            dom_snapshot_path: dir.join("page_source.html"),
            target,
            status,
            attempts: 1,
            duration: Duration::from_millis(3200),
        });
    }
    let report = aggregator.build();
    let generator = ReportGenerator::new(Path::new("report.html"), Path::new("screenshots"));

    group.bench_function("render_100", |b| {
        b.iter(|| black_box(generator.render(black_box(&report))));
    });

    group.bench_function("format_duration", |b| {
        b.iter(|| black_box(format_duration(black_box(Duration::from_millis(3200)))));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_normalization,
    benchmark_identifier_derivation,
    benchmark_report_rendering
);
criterion_main!(benches);
