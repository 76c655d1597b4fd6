use crate::{BackendKind, CaptureAttempt, CaptureResult};
use metrics::{register_counter, register_histogram, Counter, Histogram};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Capture counters for one run.
///
/// The `metrics` handles are registered with the global recorder when the
/// run starts and are no-ops if none is installed. The atomic tallies back
/// the end-of-run summary either way.
pub struct Metrics {
    pub attempts_started: Counter,
    pub attempts_failed: Counter,
    pub attempt_duration: Histogram,
    pub fallbacks: Counter,
    pub timeouts: Counter,
    pub targets_captured: Counter,
    pub targets_failed: Counter,
    attempts: AtomicUsize,
    fast_successes: AtomicUsize,
    full_successes: AtomicUsize,
    timeout_count: AtomicUsize,
    fallback_count: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            attempts_started: register_counter!("web_capture_attempts_total"),
            attempts_failed: register_counter!("web_capture_attempts_failed_total"),
            attempt_duration: register_histogram!("web_capture_attempt_duration_seconds"),
            fallbacks: register_counter!("web_capture_fallbacks_total"),
            timeouts: register_counter!("web_capture_timeouts_total"),
            targets_captured: register_counter!("web_capture_targets_captured_total"),
            targets_failed: register_counter!("web_capture_targets_failed_total"),
            attempts: AtomicUsize::new(0),
            fast_successes: AtomicUsize::new(0),
            full_successes: AtomicUsize::new(0),
            timeout_count: AtomicUsize::new(0),
            fallback_count: AtomicUsize::new(0),
        }
    }

    pub fn record_attempt(&self, attempt: &CaptureAttempt) {
        self.attempts_started.increment(1);
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.attempt_duration.record(attempt.duration.as_secs_f64());

        match attempt.error() {
            None => {
                let slot = match attempt.backend {
                    BackendKind::Fast => &self.fast_successes,
                    BackendKind::Full => &self.full_successes,
                };
                slot.fetch_add(1, Ordering::Relaxed);
            }
            Some(err) => {
                self.attempts_failed.increment(1);
                if err.is_timeout() {
                    self.timeouts.increment(1);
                    self.timeout_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn record_fallback(&self) {
        self.fallbacks.increment(1);
        self.fallback_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result(&self, result: &CaptureResult) {
        if result.is_success() {
            self.targets_captured.increment(1);
        } else {
            self.targets_failed.increment(1);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            fast_successes: self.fast_successes.load(Ordering::Relaxed),
            full_successes: self.full_successes.load(Ordering::Relaxed),
            timeouts: self.timeout_count.load(Ordering::Relaxed),
            fallbacks: self.fallback_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attempts: usize,
    pub fast_successes: usize,
    pub full_successes: usize,
    pub timeouts: usize,
    pub fallbacks: usize,
}

pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    start_time: std::time::Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn record_completion(&self, success: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_progress(&self) -> ProgressInfo {
        let completed = self.completed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        ProgressInfo {
            total: self.total,
            completed,
            errors,
            success: completed - errors,
            elapsed,
            eta: if rate > 0.0 {
                let remaining = self.total.saturating_sub(completed);
                Some(Duration::from_secs_f64(remaining as f64 / rate))
            } else {
                None
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Relaxed) >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    pub success: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArtifactPaths, CaptureError};
    use std::path::Path;

    #[test]
    fn test_record_attempts() {
        let metrics = Metrics::new();
        let paths = ArtifactPaths::in_dir(Path::new("x"), "screenshot.png");

        metrics.record_attempt(&CaptureAttempt::failed(
            BackendKind::Fast,
            CaptureError::Timeout(Duration::from_secs(1)),
            paths.clone(),
            Duration::from_secs(1),
        ));
        metrics.record_fallback();
        metrics.record_attempt(&CaptureAttempt::succeeded(
            BackendKind::Full,
            paths,
            Duration::from_secs(2),
        ));

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                attempts: 2,
                fast_successes: 0,
                full_successes: 1,
                timeouts: 1,
                fallbacks: 1,
            }
        );
    }

    #[test]
    fn test_progress_tracker() {
        let tracker = ProgressTracker::new(10);
        assert!(!tracker.is_complete());

        for i in 0..10 {
            tracker.record_completion(i % 5 != 0);
        }

        let progress = tracker.get_progress();
        assert!(tracker.is_complete());
        assert_eq!(progress.completed, 10);
        assert_eq!(progress.errors, 2);
        assert_eq!(progress.success, 8);
    }
}
