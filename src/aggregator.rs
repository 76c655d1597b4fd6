//! Per-target results and the ordered report they are collected into

use crate::{format_duration, BackendKind, CaptureTarget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Final state of a target once its fallback chain has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CaptureStatus {
    Captured {
        backend: BackendKind,
    },
    /// `backend` is the last backend tried, or `None` when none could run.
    Failed {
        backend: Option<BackendKind>,
        reason: String,
    },
}

impl CaptureStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureStatus::Captured { .. })
    }
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Captured { backend } => write!(f, "Success ({backend})"),
            CaptureStatus::Failed {
                backend: Some(backend),
                reason,
            } => write!(f, "Failed with {backend}: {reason}"),
            CaptureStatus::Failed {
                backend: None,
                reason,
            } => write!(f, "Failed: {reason}"),
        }
    }
}

/// Outcome for one target. Artifact paths are relative to the output root
/// and are filled in even when the files were never written.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub target: CaptureTarget,
    pub status: CaptureStatus,
    pub screenshot_path: PathBuf,
    pub dom_snapshot_path: PathBuf,
    pub attempts: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_text(&self) -> String {
        self.status.to_string()
    }
}

fn serialize_duration<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(*duration))
}

/// Aggregated, ordered view of a finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    results: Vec<CaptureResult>,
    generated_at: DateTime<Utc>,
}

impl Report {
    pub fn results(&self) -> &[CaptureResult] {
        &self.results
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn captured(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.captured()
    }
}

/// Collects results in the order they are added.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<CaptureResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, result: CaptureResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn build(self) -> Report {
        Report {
            results: self.results,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    fn result_for(raw: &str, status: CaptureStatus) -> CaptureResult {
        let target = normalize(raw).unwrap();
        CaptureResult {
            screenshot_path: PathBuf::from(target.identifier()).join("screenshot.png"),
            dom_snapshot_path: PathBuf::from(target.identifier()).join("page_source.html"),
            target,
            status,
            attempts: 1,
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_status_text() {
        let ok = CaptureStatus::Captured {
            backend: BackendKind::Fast,
        };
        assert_eq!(ok.to_string(), "Success (Fast Renderer)");

        let failed = CaptureStatus::Failed {
            backend: Some(BackendKind::Full),
            reason: "Timeout after 15s".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "Failed with Full Browser Renderer: Timeout after 15s"
        );
    }

    #[test]
    fn test_aggregator_preserves_insertion_order() {
        let mut aggregator = ResultAggregator::new();
        for raw in ["c.com", "a.com", "b.com", "a.com"] {
            aggregator.add(result_for(
                raw,
                CaptureStatus::Captured {
                    backend: BackendKind::Fast,
                },
            ));
        }
        assert_eq!(aggregator.len(), 4);

        let report = aggregator.build();
        let raws: Vec<_> = report.results().iter().map(|r| r.target.raw_input()).collect();
        assert_eq!(raws, vec!["c.com", "a.com", "b.com", "a.com"]);
    }

    #[test]
    fn test_report_counts() {
        let mut aggregator = ResultAggregator::with_capacity(2);
        aggregator.add(result_for(
            "example.com",
            CaptureStatus::Captured {
                backend: BackendKind::Full,
            },
        ));
        aggregator.add(result_for(
            "bad_target",
            CaptureStatus::Failed {
                backend: Some(BackendKind::Full),
                reason: "Navigation failed: net::ERR_NAME_NOT_RESOLVED".to_string(),
            },
        ));

        let report = aggregator.build();
        assert_eq!(report.total(), 2);
        assert_eq!(report.captured(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_result_serializes() {
        let result = result_for(
            "example.com",
            CaptureStatus::Failed {
                backend: None,
                reason: "IO error: denied".to_string(),
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"]["state"], "failed");
        assert_eq!(json["duration"], "1.5s");
        assert_eq!(json["target"]["address"], "http://example.com");
    }
}
