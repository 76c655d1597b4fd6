use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single target or a single backend attempt.
///
/// These never abort a batch: the orchestrator records them in the target's
/// result and moves on.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Empty input line")]
    EmptyInput,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Engine crashed: {0}")]
    EngineCrashed(String),

    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl CaptureError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::EmptyInput => "empty_input",
            CaptureError::BrowserLaunchFailed(_) => "launch",
            CaptureError::NavigationFailed(_) => "navigation",
            CaptureError::CaptureFailed(_) => "capture",
            CaptureError::Timeout(_) => "timeout",
            CaptureError::EngineCrashed(_) => "engine",
            CaptureError::ImageEncoding(_) => "image",
            CaptureError::IoError(_) => "io",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Timeout(_))
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::IoError(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::ImageEncoding(err.to_string())
    }
}

/// Conditions outside any single target's control. Only these end a run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read input {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output root {path}: {source}")]
    OutputRootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
