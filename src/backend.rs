//! Capture backend contract
//!
//! The orchestrator only ever talks to a rendering engine through
//! [`CaptureBackend::capture`]. Every failure an engine can produce comes back
//! as an [`AttemptOutcome::Failure`] value, never as a propagated error.

use crate::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialized page markup file name inside a target directory.
pub const DOM_SNAPSHOT_FILE: &str = "page_source.html";

/// The interchangeable rendering engines, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Headless engine, viewport screenshot
    Fast,
    /// Windowed engine, full-page screenshot
    Full,
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Fast => "fast",
            BackendKind::Full => "full",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Fast => write!(f, "Fast Renderer"),
            BackendKind::Full => write!(f, "Full Browser Renderer"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(BackendKind::Fast),
            "full" => Ok(BackendKind::Full),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Where an attempt writes (or would have written) its two artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub screenshot: PathBuf,
    pub dom_snapshot: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path, screenshot_file: &str) -> Self {
        Self {
            screenshot: dir.join(screenshot_file),
            dom_snapshot: dir.join(DOM_SNAPSHOT_FILE),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Failure(CaptureError),
}

/// Result of one backend invocation for one target.
#[derive(Debug, Clone)]
pub struct CaptureAttempt {
    pub backend: BackendKind,
    pub outcome: AttemptOutcome,
    pub artifacts: ArtifactPaths,
    pub duration: Duration,
}

impl CaptureAttempt {
    pub fn succeeded(backend: BackendKind, artifacts: ArtifactPaths, duration: Duration) -> Self {
        Self {
            backend,
            outcome: AttemptOutcome::Success,
            artifacts,
            duration,
        }
    }

    pub fn failed(
        backend: BackendKind,
        error: CaptureError,
        artifacts: ArtifactPaths,
        duration: Duration,
    ) -> Self {
        Self {
            backend,
            outcome: AttemptOutcome::Failure(error),
            artifacts,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success)
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::Failure(err) => Some(err),
        }
    }
}

/// A rendering engine able to load a page and snapshot it.
///
/// Implementations must return within roughly `timeout` and must release
/// every engine resource they acquired before returning, whatever the
/// outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// File name the screenshot is written under inside `output_dir`.
    fn screenshot_file_name(&self) -> String;

    async fn capture(&self, address: &str, output_dir: &Path, timeout: Duration) -> CaptureAttempt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse_and_display() {
        assert_eq!(" FAST ".parse::<BackendKind>().unwrap(), BackendKind::Fast);
        assert_eq!("full".parse::<BackendKind>().unwrap(), BackendKind::Full);
        assert!("selenium".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Full.to_string(), "Full Browser Renderer");
    }

    #[test]
    fn test_artifact_paths() {
        let paths = ArtifactPaths::in_dir(Path::new("out/example.com"), "screenshot.png");
        assert_eq!(paths.screenshot, PathBuf::from("out/example.com/screenshot.png"));
        assert_eq!(paths.dom_snapshot, PathBuf::from("out/example.com/page_source.html"));
    }
}
