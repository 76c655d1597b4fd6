//! Static HTML (and optional JSON) rendering of a finished report

use crate::{format_duration, BatchError, CaptureResult, Report};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use pathdiff::diff_paths;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Characters that cannot appear verbatim in an href path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'|')
    .add(b'\\');

const STYLE: &str = "\
body { font-family: Arial, sans-serif; padding: 20px; }
.summary { color: #555; }
.entry { border: 1px solid #ccc; padding: 10px; margin-bottom: 20px; }
.entry.failed { border-color: #d9534f; background: #fdf3f3; }
.meta { color: #777; font-size: 0.9em; }
.screenshot { width: 300px; border: 1px solid #ddd; }";

/// Renders a [`Report`] with artifact links relative to the report file.
pub struct ReportGenerator {
    artifact_base: PathBuf,
}

impl ReportGenerator {
    pub fn new(report_path: &Path, output_root: &Path) -> Self {
        let report_dir = report_path.parent().unwrap_or_else(|| Path::new(""));
        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            warn!("Cannot resolve working directory, report links may break: {}", e);
            PathBuf::new()
        });
        Self {
            artifact_base: relative_path(output_root, report_dir, &cwd),
        }
    }

    pub fn render(&self, report: &Report) -> String {
        self.markup(report).into_string()
    }

    fn markup(&self, report: &Report) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { "Web Capture Report" }
                    style { (PreEscaped(STYLE)) }
                }
                body {
                    h1 { "Web Capture Report" }
                    p.summary {
                        "Generated "
                        (report.generated_at().format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        " | " (report.total()) " targets, "
                        (report.captured()) " captured, "
                        (report.failed()) " failed"
                    }
                    @for result in report.results() {
                        (self.entry(result))
                    }
                }
            }
        }
    }

    fn entry(&self, result: &CaptureResult) -> Markup {
        html! {
            div.entry.failed[!result.is_success()] {
                h2 { (result.target.address()) }
                p { "Status: " (result.status_text()) }
                p.meta {
                    "Attempts: " (result.attempts)
                    " | Duration: " (format_duration(result.duration))
                }
                @if result.is_success() {
                    @let screenshot = self.link(&result.screenshot_path);
                    a href=(screenshot) target="_blank" {
                        img.screenshot src=(screenshot) alt=(result.target.raw_input());
                    }
                    br;
                    a href=(self.link(&result.dom_snapshot_path)) target="_blank" {
                        "View Page Source"
                    }
                } @else {
                    p.meta { "No artifacts captured" }
                }
            }
        }
    }

    /// Href for a path relative to the output root.
    fn link(&self, artifact: &Path) -> String {
        let joined = self.artifact_base.join(artifact);
        joined
            .components()
            .map(|c| match c {
                Component::RootDir => String::new(),
                Component::Normal(segment) => {
                    utf8_percent_encode(&segment.to_string_lossy(), PATH_SEGMENT).to_string()
                }
                other => other.as_os_str().to_string_lossy().into_owned(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    pub async fn write(&self, report: &Report, path: &Path) -> Result<(), BatchError> {
        let document = self.render(report);
        write_file(path, document.as_bytes()).await?;
        info!("Report saved to: {}", path.display());
        Ok(())
    }

    pub async fn write_json(&self, report: &Report, path: &Path) -> Result<(), BatchError> {
        let document = serde_json::to_vec_pretty(report)?;
        write_file(path, &document).await?;
        info!("JSON report saved to: {}", path.display());
        Ok(())
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), BatchError> {
    let to_batch_error = |source| BatchError::ReportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_batch_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(to_batch_error)
}

/// Path of `target` as seen from directory `base`, both taken relative to `cwd`.
fn relative_path(target: &Path, base: &Path, cwd: &Path) -> PathBuf {
    diff_paths(absolutize(target, cwd), absolutize(base, cwd))
        .unwrap_or_else(|| target.to_path_buf())
}

/// Joins `path` onto `cwd` and folds `.` and `..` without touching the disk.
fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize, BackendKind, CaptureStatus, ResultAggregator};
    use std::time::Duration;

    fn report() -> Report {
        let mut aggregator = ResultAggregator::new();
        for (raw, status) in [
            (
                "example.com",
                CaptureStatus::Captured {
                    backend: BackendKind::Fast,
                },
            ),
            (
                "<script>alert(1)</script>",
                CaptureStatus::Failed {
                    backend: Some(BackendKind::Full),
                    reason: "Navigation failed: net::ERR_NAME_NOT_RESOLVED".to_string(),
                },
            ),
        ] {
            let target = normalize(raw).unwrap();
            let dir = PathBuf::from(target.identifier());
            aggregator.add(CaptureResult {
                screenshot_path: dir.join("screenshot.png"),
                dom_snapshot_path: dir.join("page_source.html"),
                target,
                status,
                attempts: 2,
                duration: Duration::from_secs(4),
            });
        }
        aggregator.build()
    }

    #[test]
    fn test_relative_path() {
        let cwd = Path::new("/work/standalone");
        let rel = |target: &str, base: &str| relative_path(Path::new(target), Path::new(base), cwd);

        assert_eq!(rel("screenshots", ""), PathBuf::from("screenshots"));
        assert_eq!(rel("out/shots", "out"), PathBuf::from("shots"));
        assert_eq!(rel("shots", "reports/daily"), PathBuf::from("../../shots"));
        assert_eq!(rel("/data/shots", "/data/reports"), PathBuf::from("../shots"));
        assert_eq!(rel("./shots", "./"), PathBuf::from("shots"));
    }

    #[test]
    fn test_relative_path_report_in_parent_dir() {
        let cwd = Path::new("/work/standalone");
        assert_eq!(
            relative_path(Path::new("shots"), Path::new(".."), cwd),
            PathBuf::from("standalone/shots")
        );
        assert_eq!(
            relative_path(Path::new("../other/shots"), Path::new("../reports"), cwd),
            PathBuf::from("../other/shots")
        );
    }

    #[test]
    fn test_link_encodes_reserved_characters() {
        let generator = ReportGenerator {
            artifact_base: PathBuf::from("shots#1/100% done?"),
        };
        let href = generator.link(Path::new("example.com/screenshot.png"));

        assert_eq!(href, "shots%231/100%25%20done%3F/example.com/screenshot.png");
        assert!(!href.contains('#'));
        assert_eq!(
            ReportGenerator {
                artifact_base: PathBuf::from("../shots"),
            }
            .link(Path::new("a_b/page_source.html")),
            "../shots/a_b/page_source.html"
        );
    }

    #[test]
    fn test_render_links_successful_targets() {
        let generator = ReportGenerator::new(Path::new("report.html"), Path::new("screenshots"));
        let html = generator.render(&report());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"src="screenshots/example.com/screenshot.png""#));
        assert!(html.contains(r#"href="screenshots/example.com/page_source.html""#));
        assert!(html.contains("Status: Success (Fast Renderer)"));
        assert!(html.contains("2 targets, 1 captured, 1 failed"));
    }

    #[test]
    fn test_render_failed_entry_without_links() {
        let generator = ReportGenerator::new(Path::new("report.html"), Path::new("screenshots"));
        let html = generator.render(&report());

        assert!(html.contains("Failed with Full Browser Renderer: Navigation failed"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(!html.contains("_script_alert_1___script_/screenshot.png"));
        assert_eq!(html.matches("class=\"entry failed\"").count(), 1);
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        let json_path = dir.path().join("report.json");
        let generator = ReportGenerator::new(&path, &dir.path().join("screenshots"));
        let report = report();

        generator.write(&report, &path).await.unwrap();
        generator.write_json(&report, &json_path).await.unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("../screenshots/example.com/screenshot.png"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
    }
}
