//! Batch pipeline: normalizer -> orchestrator -> aggregator
//!
//! Scheduling is the only thing that changes between sequential and
//! concurrent runs. Workers pull `(index, target)` pairs from a shared
//! queue and send `(index, result)` pairs to a single collector, which is
//! the only writer of the [`ResultAggregator`] and re-emits results in input
//! order.

use crate::{
    format_duration, BatchError, CaptureResult, CaptureTarget, Config, FallbackOrchestrator,
    Metrics, ProgressTracker, Report, ReportGenerator, ResultAggregator, TargetNormalizer,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Reads the input file and normalizes every non-blank line.
pub async fn read_targets(
    path: &Path,
    disambiguate: bool,
) -> Result<Vec<CaptureTarget>, BatchError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| BatchError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let targets = TargetNormalizer::new(disambiguate).normalize_lines(content.lines());
    info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

pub struct CaptureBatch {
    orchestrator: Arc<FallbackOrchestrator>,
    concurrency: usize,
    metrics: Arc<Metrics>,
}

impl CaptureBatch {
    pub fn new(config: &Config, orchestrator: FallbackOrchestrator, metrics: Arc<Metrics>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            concurrency: config.concurrency.max(1),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Captures every target and returns the report in input order.
    ///
    /// Fails only when the output root cannot be created.
    pub async fn run(&self, targets: Vec<CaptureTarget>) -> Result<Report, BatchError> {
        let output_root = self.orchestrator.output_root();
        tokio::fs::create_dir_all(output_root)
            .await
            .map_err(|source| BatchError::OutputRootUnavailable {
                path: output_root.to_path_buf(),
                source,
            })?;

        let total = targets.len();
        let progress = ProgressTracker::new(total);
        info!(
            "Capturing {} targets with concurrency {}",
            total, self.concurrency
        );

        let aggregator = if self.concurrency == 1 || total <= 1 {
            self.run_sequential(targets, &progress).await
        } else {
            self.run_pooled(targets, &progress).await
        };

        let report = aggregator.build();
        info!(
            "Batch completed. Captured: {}, Failed: {}",
            report.captured(),
            report.failed()
        );
        Ok(report)
    }

    async fn run_sequential(
        &self,
        targets: Vec<CaptureTarget>,
        progress: &ProgressTracker,
    ) -> ResultAggregator {
        let mut aggregator = ResultAggregator::with_capacity(targets.len());

        for target in targets {
            info!("Processing: {}", target.raw_input());
            let result = self.orchestrator.capture_target(&target).await;
            record_progress(progress, &result);
            aggregator.add(result);
        }

        aggregator
    }

    async fn run_pooled(
        &self,
        targets: Vec<CaptureTarget>,
        progress: &ProgressTracker,
    ) -> ResultAggregator {
        let total = targets.len();
        let worker_count = self.concurrency.min(total);
        let submitted = targets.clone();
        let (request_sender, request_receiver) = mpsc::channel::<(usize, CaptureTarget)>(total);
        let (result_sender, mut result_receiver) = mpsc::channel::<(usize, CaptureResult)>(total);

        for indexed in targets.into_iter().enumerate() {
            if request_sender.send(indexed).await.is_err() {
                error!("Capture queue closed before all targets were submitted");
                break;
            }
        }
        drop(request_sender);

        let shared_receiver = Arc::new(Mutex::new(request_receiver));
        for id in 0..worker_count {
            let worker = CaptureWorker {
                id,
                orchestrator: self.orchestrator.clone(),
            };
            let requests = shared_receiver.clone();
            let results = result_sender.clone();
            tokio::spawn(async move { worker.run(requests, results).await });
        }
        drop(result_sender);

        // Buffer out-of-order completions until the next expected index arrives
        let mut aggregator = ResultAggregator::with_capacity(total);
        let mut pending: BTreeMap<usize, CaptureResult> = BTreeMap::new();
        let mut next = 0;

        while let Some((index, result)) = result_receiver.recv().await {
            record_progress(progress, &result);
            pending.insert(index, result);
            while let Some(result) = pending.remove(&next) {
                aggregator.add(result);
                next += 1;
            }
        }

        if next < total {
            error!(
                "Workers stopped early: {} of {} results collected",
                next + pending.len(),
                total
            );
        }

        // Every target keeps its row even if the worker capturing it died
        for (index, target) in submitted.iter().enumerate().skip(next) {
            let result = match pending.remove(&index) {
                Some(result) => result,
                None => {
                    let result = self
                        .orchestrator
                        .abandoned_result(target, "capture worker stopped unexpectedly");
                    record_progress(progress, &result);
                    result
                }
            };
            aggregator.add(result);
        }

        aggregator
    }
}

struct CaptureWorker {
    id: usize,
    orchestrator: Arc<FallbackOrchestrator>,
}

impl CaptureWorker {
    async fn run(
        self,
        requests: Arc<Mutex<mpsc::Receiver<(usize, CaptureTarget)>>>,
        results: mpsc::Sender<(usize, CaptureResult)>,
    ) {
        debug!("Starting capture worker {}", self.id);

        loop {
            let request = {
                let mut receiver = requests.lock().await;
                receiver.recv().await
            };

            let Some((index, target)) = request else {
                break;
            };

            debug!("Worker {} processing {}", self.id, target.raw_input());
            let result = self.orchestrator.capture_target(&target).await;

            if let Err(e) = results.send((index, result)).await {
                error!("Worker {} failed to send result: {}", self.id, e);
                break;
            }
        }

        debug!("Capture worker {} stopped", self.id);
    }
}

fn record_progress(progress: &ProgressTracker, result: &CaptureResult) {
    progress.record_completion(result.is_success());
    let info = progress.get_progress();
    info!(
        "Progress: {}/{} - {} -> {} (ETA: {:?})",
        info.completed,
        info.total,
        result.target.raw_input(),
        result.status,
        info.eta
    );
}

/// Reads targets, captures them, then writes the HTML and optional JSON report.
pub async fn run_batch(
    config: &Config,
    orchestrator: FallbackOrchestrator,
    metrics: Arc<Metrics>,
) -> Result<Report, BatchError> {
    let start = Instant::now();
    let targets = read_targets(&config.input_path, config.disambiguate_identifiers).await?;

    let batch = CaptureBatch::new(config, orchestrator, metrics);
    let report = batch.run(targets).await?;

    let generator = ReportGenerator::new(&config.report_path, &config.output_root);
    generator.write(&report, &config.report_path).await?;
    if let Some(json_path) = &config.json_report_path {
        generator.write_json(&report, json_path).await?;
    }

    let snapshot = batch.metrics().snapshot();
    info!(
        "Run finished in {}: {} attempts, {} fallbacks, {} timeouts",
        format_duration(start.elapsed()),
        snapshot.attempts,
        snapshot.fallbacks,
        snapshot.timeouts
    );

    Ok(report)
}
