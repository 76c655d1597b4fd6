//! Configuration management with serde serialization/deserialization
//!
//! A single [`Config`] value is built once (defaults, then an optional JSON
//! file, then CLI overrides) and handed to the batch pipeline. Nothing in the
//! crate reads configuration from globals.

use crate::engine::TEARDOWN_BUDGET;
use crate::{BackendKind, BatchError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a capture run
///
/// # Examples
///
/// ```rust
/// use web_capture::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     concurrency: 4,
///     attempt_timeout: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Text file with one target per line (default: `input.txt`)
    pub input_path: PathBuf,

    /// Directory receiving one subdirectory per target (default: `screenshots`)
    pub output_root: PathBuf,

    /// HTML report location (default: `report.html`)
    pub report_path: PathBuf,

    /// Optional machine-readable copy of the report
    pub json_report_path: Option<PathBuf>,

    /// Wall-clock budget for one backend attempt (default: 15 seconds)
    ///
    /// Covers engine launch, navigation, the settle delay and the capture
    /// itself. An attempt that runs out of budget has its engine killed.
    pub attempt_timeout: Duration,

    /// Extra time the orchestrator grants a backend past `attempt_timeout`
    /// for engine teardown before abandoning the attempt (default: 8 seconds)
    ///
    /// Must cover [`TEARDOWN_BUDGET`].
    pub attempt_grace: Duration,

    /// Pause after navigation before capturing (default: 3 seconds)
    ///
    /// Gives asynchronous page content a chance to render. This is a
    /// heuristic, not a readiness guarantee.
    pub settle_delay: Duration,

    /// Backends in the order they are tried (default: fast, then full)
    pub backend_order: Vec<BackendKind>,

    /// Number of targets captured at once (default: 1, strictly sequential)
    pub concurrency: usize,

    /// Image format for screenshots (default: PNG)
    pub screenshot_format: OutputFormat,

    /// Browser viewport used by both renderers
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string
    pub user_agent: Option<String>,

    /// Run the full browser renderer without a window (default: false)
    ///
    /// The full renderer opens a real window by default. Set this on
    /// machines without a display.
    pub full_browser_headless: bool,

    /// Suffix colliding identifiers instead of letting later targets
    /// overwrite earlier ones (default: true)
    pub disambiguate_identifiers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input.txt"),
            output_root: PathBuf::from("screenshots"),
            report_path: PathBuf::from("report.html"),
            json_report_path: None,
            attempt_timeout: Duration::from_secs(15),
            attempt_grace: Duration::from_secs(8),
            settle_delay: Duration::from_secs(3),
            backend_order: vec![BackendKind::Fast, BackendKind::Full],
            concurrency: 1,
            screenshot_format: OutputFormat::Png,
            viewport: Viewport::default(),
            chrome_path: None,
            user_agent: None,
            full_browser_headless: false,
            disambiguate_identifiers: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.concurrency == 0 {
            return Err(BatchError::Configuration(
                "Concurrency must be greater than 0".into(),
            ));
        }

        if self.attempt_timeout.is_zero() {
            return Err(BatchError::Configuration(
                "Attempt timeout must be greater than 0".into(),
            ));
        }

        if self.attempt_grace < TEARDOWN_BUDGET {
            return Err(BatchError::Configuration(format!(
                "Attempt grace {:?} is shorter than the engine teardown budget {:?}",
                self.attempt_grace, TEARDOWN_BUDGET
            )));
        }

        if self.settle_delay >= self.attempt_timeout {
            return Err(BatchError::Configuration(format!(
                "Settle delay {:?} leaves no time within the attempt timeout {:?}",
                self.settle_delay, self.attempt_timeout
            )));
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(BatchError::Configuration(
                "Viewport dimensions must be greater than 0".into(),
            ));
        }

        if self.backend_order.is_empty() {
            return Err(BatchError::Configuration(
                "At least one backend is required".into(),
            ));
        }

        for (i, kind) in self.backend_order.iter().enumerate() {
            if self.backend_order[..i].contains(kind) {
                return Err(BatchError::Configuration(format!(
                    "Backend {kind} listed more than once"
                )));
            }
        }

        Ok(())
    }

    /// File name of the screenshot artifact inside a target directory.
    pub fn screenshot_file_name(&self) -> String {
        format!("screenshot.{}", self.screenshot_format.extension())
    }
}

/// Browser viewport configuration for screenshots
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio (default: 1.0)
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Supported output image formats for screenshots
///
/// The engine always produces PNG; other formats are transcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(format!("unsupported screenshot format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.attempt_timeout, Duration::from_secs(15));
        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert_eq!(config.backend_order, vec![BackendKind::Fast, BackendKind::Full]);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.screenshot_file_name(), "screenshot.png");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_backends() {
        let config = Config {
            backend_order: vec![BackendKind::Full, BackendKind::Full],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BatchError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_grace_shorter_than_teardown() {
        let config = Config {
            attempt_grace: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BatchError::Configuration(_))));

        let config = Config {
            attempt_grace: TEARDOWN_BUDGET,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_settle_longer_than_timeout() {
        let config = Config {
            attempt_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "concurrency": 3, "backend_order": ["full"] }"#).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.backend_order, vec![BackendKind::Full]);
        assert_eq!(config.report_path, PathBuf::from("report.html"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("webp".parse::<OutputFormat>().unwrap().extension(), "webp");
        assert!("gif".parse::<OutputFormat>().is_err());
    }
}
