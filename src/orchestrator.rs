//! Fallback orchestration for a single target
//!
//! Backends are tried strictly in priority order, each at most once, until
//! one succeeds. Nothing a backend does, including panicking or ignoring its
//! own deadline, escapes the attempt it happened in.

use crate::{
    ArtifactPaths, AttemptOutcome, CaptureAttempt, CaptureBackend, CaptureError, CaptureResult,
    CaptureStatus, CaptureTarget, Config, Metrics, DOM_SNAPSHOT_FILE,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct FallbackOrchestrator {
    backends: Vec<Arc<dyn CaptureBackend>>,
    output_root: PathBuf,
    attempt_timeout: Duration,
    attempt_grace: Duration,
    metrics: Arc<Metrics>,
}

impl FallbackOrchestrator {
    pub fn new(
        config: &Config,
        backends: Vec<Arc<dyn CaptureBackend>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            backends,
            output_root: config.output_root.clone(),
            attempt_timeout: config.attempt_timeout,
            attempt_grace: config.attempt_grace,
            metrics,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Runs the fallback chain for `target` and always produces a result.
    pub async fn capture_target(&self, target: &CaptureTarget) -> CaptureResult {
        let start = Instant::now();
        let target_dir = self.output_root.join(target.identifier());
        let fallback_file = self
            .backends
            .first()
            .map(|b| b.screenshot_file_name())
            .unwrap_or_else(|| "screenshot.png".to_string());

        if let Err(e) = tokio::fs::create_dir_all(&target_dir).await {
            warn!(
                "Cannot create output directory {} for {}: {}",
                target_dir.display(),
                target.address(),
                e
            );
            let result = self.build_result(
                target,
                CaptureStatus::Failed {
                    backend: None,
                    reason: CaptureError::from(e).to_string(),
                },
                &fallback_file,
                0,
                start.elapsed(),
            );
            self.metrics.record_result(&result);
            return result;
        }

        let mut last_attempt: Option<CaptureAttempt> = None;
        let mut attempts = 0;

        for backend in &self.backends {
            if let Some(previous) = &last_attempt {
                debug!(
                    "Falling back from {} to {} for {}",
                    previous.backend,
                    backend.kind(),
                    target.address()
                );
                self.metrics.record_fallback();
            }

            let attempt = self.isolated_attempt(backend.as_ref(), target, &target_dir).await;
            attempts += 1;
            self.metrics.record_attempt(&attempt);

            let succeeded = attempt.is_success();
            match attempt.error() {
                None => info!(
                    "Captured {} with {} in {:?}",
                    target.address(),
                    attempt.backend,
                    attempt.duration
                ),
                Some(err) => warn!("{} failed for {}: {}", attempt.backend, target.address(), err),
            }

            last_attempt = Some(attempt);
            if succeeded {
                break;
            }
        }

        let (status, screenshot_file) = match last_attempt {
            Some(attempt) => {
                let file = file_name_of(&attempt.artifacts.screenshot)
                    .unwrap_or_else(|| fallback_file.clone());
                let status = match attempt.outcome {
                    AttemptOutcome::Success => CaptureStatus::Captured {
                        backend: attempt.backend,
                    },
                    AttemptOutcome::Failure(err) => CaptureStatus::Failed {
                        backend: Some(attempt.backend),
                        reason: err.to_string(),
                    },
                };
                (status, file)
            }
            None => (
                CaptureStatus::Failed {
                    backend: None,
                    reason: "no capture backends configured".to_string(),
                },
                fallback_file,
            ),
        };

        let result = self.build_result(target, status, &screenshot_file, attempts, start.elapsed());
        self.metrics.record_result(&result);
        result
    }

    /// Result for a target whose capture never reported back.
    pub fn abandoned_result(&self, target: &CaptureTarget, reason: &str) -> CaptureResult {
        let screenshot_file = self
            .backends
            .first()
            .map(|b| b.screenshot_file_name())
            .unwrap_or_else(|| "screenshot.png".to_string());
        let result = self.build_result(
            target,
            CaptureStatus::Failed {
                backend: None,
                reason: reason.to_string(),
            },
            &screenshot_file,
            0,
            Duration::ZERO,
        );
        self.metrics.record_result(&result);
        result
    }

    /// Invokes one backend, converting panics and overruns into failures.
    async fn isolated_attempt(
        &self,
        backend: &dyn CaptureBackend,
        target: &CaptureTarget,
        target_dir: &Path,
    ) -> CaptureAttempt {
        let kind = backend.kind();
        let start = Instant::now();
        let guard = self.attempt_timeout + self.attempt_grace;
        let artifacts = ArtifactPaths::in_dir(target_dir, &backend.screenshot_file_name());

        let capture = AssertUnwindSafe(backend.capture(
            target.address(),
            target_dir,
            self.attempt_timeout,
        ))
        .catch_unwind();

        match tokio::time::timeout(guard, capture).await {
            Ok(Ok(attempt)) => attempt,
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "backend panicked".to_string());
                CaptureAttempt::failed(
                    kind,
                    CaptureError::EngineCrashed(message),
                    artifacts,
                    start.elapsed(),
                )
            }
            Err(_) => {
                warn!("{} overran its {:?} budget, abandoning attempt", kind, guard);
                CaptureAttempt::failed(
                    kind,
                    CaptureError::Timeout(self.attempt_timeout),
                    artifacts,
                    start.elapsed(),
                )
            }
        }
    }

    fn build_result(
        &self,
        target: &CaptureTarget,
        status: CaptureStatus,
        screenshot_file: &str,
        attempts: usize,
        duration: Duration,
    ) -> CaptureResult {
        let relative_dir = PathBuf::from(target.identifier());
        CaptureResult {
            target: target.clone(),
            status,
            screenshot_path: relative_dir.join(screenshot_file),
            dom_snapshot_path: relative_dir.join(DOM_SNAPSHOT_FILE),
            attempts,
            duration,
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
