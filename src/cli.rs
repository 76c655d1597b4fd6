use crate::{
    backends_from_config, directory_size, format_bytes, format_duration, run_batch, BackendKind,
    BatchError, Config, FallbackOrchestrator, Metrics, OutputFormat, Report,
};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::info;

#[derive(Parser)]
#[command(name = "web-capture")]
#[command(about = "Capture screenshots and page sources for a list of web targets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Per-attempt timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture every target listed in a file and write a report
    Capture {
        #[arg(short, long, help = "Input file with one target per line")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Output root for per-target directories")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "HTML report path")]
        report: Option<PathBuf>,

        #[arg(long, help = "Also write the report as JSON to this path")]
        json_report: Option<PathBuf>,

        #[arg(short, long, help = "Number of targets captured at once")]
        concurrency: Option<usize>,

        #[arg(long, help = "Screenshot format (png, jpeg, webp)")]
        format: Option<OutputFormat>,

        #[arg(long, help = "Settle delay in milliseconds before capturing")]
        settle_ms: Option<u64>,

        #[arg(long, value_delimiter = ',', help = "Backend order, e.g. fast,full")]
        backends: Option<Vec<BackendKind>>,

        #[arg(long, help = "Run the full browser renderer without a window")]
        headless_full: bool,
    },

    /// Validate the configuration (from `--config` and flags) and print it
    Validate,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub json_report: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub format: Option<OutputFormat>,
    pub settle_ms: Option<u64>,
    pub backends: Option<Vec<BackendKind>>,
    pub headless_full: bool,
}

impl CaptureOptions {
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_root = output.clone();
        }
        if let Some(report) = &self.report {
            config.report_path = report.clone();
        }
        if let Some(json_report) = &self.json_report {
            config.json_report_path = Some(json_report.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(format) = self.format {
            config.screenshot_format = format;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay = Duration::from_millis(settle_ms);
        }
        if let Some(backends) = &self.backends {
            config.backend_order = backends.clone();
        }
        if self.headless_full {
            config.full_browser_headless = true;
        }
    }
}

pub struct CliRunner {
    pub config: Config,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Capture { .. } => {
                let report = self.run_capture().await?;
                self.print_summary(&report).await;
                Ok(())
            }
            Commands::Validate => {
                self.print_config();
                Ok(())
            }
        }
    }

    /// Runs the whole batch with the production renderers.
    pub async fn run_capture(&self) -> Result<Report, BatchError> {
        let metrics = Arc::new(Metrics::new());
        let orchestrator = FallbackOrchestrator::new(
            &self.config,
            backends_from_config(&self.config),
            metrics.clone(),
        );
        run_batch(&self.config, orchestrator, metrics).await
    }

    /// Prints the effective configuration. It has already been validated
    /// by [`load_config`].
    pub fn print_config(&self) {
        let config = &self.config;
        println!("Configuration is valid:");
        println!("  Input: {}", config.input_path.display());
        println!("  Output root: {}", config.output_root.display());
        println!("  Report: {}", config.report_path.display());
        println!(
            "  Backends: {}",
            config
                .backend_order
                .iter()
                .map(|b| b.label())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        println!("  Attempt timeout: {:?}", config.attempt_timeout);
        println!("  Settle delay: {:?}", config.settle_delay);
        println!("  Concurrency: {}", config.concurrency);
        println!("  Screenshot format: {:?}", config.screenshot_format);
        println!(
            "  Viewport: {}x{}",
            config.viewport.width, config.viewport.height
        );
        println!("  Full browser headless: {}", config.full_browser_headless);
    }

    async fn print_summary(&self, report: &Report) {
        let mut artifact_bytes = 0;
        for result in report.results().iter().filter(|r| r.is_success()) {
            let dir = self.config.output_root.join(result.target.identifier());
            artifact_bytes += directory_size(&dir).await;
        }

        println!("Capture completed:");
        println!("  Targets: {}", report.total());
        println!("  Captured: {}", report.captured());
        println!("  Failed: {}", report.failed());
        println!("  Artifacts: {}", format_bytes(artifact_bytes));
        println!("  Report: {}", self.config.report_path.display());

        for result in report.results().iter().filter(|r| !r.is_success()) {
            println!(
                "  {} -> {} ({})",
                result.target.raw_input(),
                result.status,
                format_duration(result.duration)
            );
        }
    }
}

async fn read_config_file(path: &Path) -> Result<Config, BatchError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| BatchError::Configuration(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Builds the effective configuration: defaults, then `--config`, then flags.
pub async fn load_config(args: &Cli) -> Result<Config, BatchError> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path).await?,
        None => Config::default(),
    };

    if let Some(timeout) = args.timeout {
        config.attempt_timeout = Duration::from_secs(timeout);
    }
    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    if let Commands::Capture {
        input,
        output,
        report,
        json_report,
        concurrency,
        format,
        settle_ms,
        backends,
        headless_full,
    } = &args.command
    {
        CaptureOptions {
            input: input.clone(),
            output: output.clone(),
            report: report.clone(),
            json_report: json_report.clone(),
            concurrency: *concurrency,
            format: *format,
            settle_ms: *settle_ms,
            backends: backends.clone(),
            headless_full: *headless_full,
        }
        .apply(&mut config);
    }

    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Attempt timeout: {:?}", config.attempt_timeout);
    info!("Concurrency: {}", config.concurrency);

    Ok(config)
}

/// Drives `work` until it finishes or `shutdown` fires. On shutdown `work`
/// is dropped before returning, which tears down any engine it still holds.
pub async fn run_until_shutdown<T>(
    work: impl Future<Output = T>,
    shutdown: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        result = work => Some(result),
        _ = shutdown => None,
    }
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_flags() {
        let cli = Cli::try_parse_from([
            "web-capture",
            "--timeout",
            "30",
            "capture",
            "--input",
            "targets.txt",
            "--backends",
            "full,fast",
            "--format",
            "jpeg",
            "--settle-ms",
            "500",
        ])
        .unwrap();

        assert_eq!(cli.timeout, Some(30));
        match cli.command {
            Commands::Capture {
                input,
                backends,
                format,
                settle_ms,
                ..
            } => {
                assert_eq!(input, Some(PathBuf::from("targets.txt")));
                assert_eq!(backends, Some(vec![BackendKind::Full, BackendKind::Fast]));
                assert_eq!(format, Some(OutputFormat::Jpeg));
                assert_eq!(settle_ms, Some(500));
            }
            Commands::Validate => panic!("expected capture command"),
        }
    }

    #[test]
    fn test_validate_uses_global_config_flag() {
        let cli =
            Cli::try_parse_from(["web-capture", "validate", "--config", "capture.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate));
        assert_eq!(cli.config, Some(PathBuf::from("capture.json")));
    }

    struct DropFlag(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_shutdown_drops_in_flight_work() {
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());
        let work = async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        };

        let outcome = run_until_shutdown(work, async {}).await;

        assert!(outcome.is_none());
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_completed_work_is_returned() {
        let outcome = run_until_shutdown(async { 7 }, std::future::pending()).await;
        assert_eq!(outcome, Some(7));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let parsed = Cli::try_parse_from(["web-capture", "capture", "--backends", "fast,slow"]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_load_config_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "concurrency": 2, "output_root": "shots" }"#).unwrap();

        let cli = Cli::try_parse_from([
            "web-capture",
            "--config",
            config_path.to_str().unwrap(),
            "--chrome-path",
            "/usr/bin/chromium",
            "capture",
            "--concurrency",
            "4",
            "--headless-full",
        ])
        .unwrap();

        let config = load_config(&cli).await.unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.output_root, PathBuf::from("shots"));
        assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert!(config.full_browser_headless);
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_values() {
        let cli = Cli::try_parse_from(["web-capture", "capture", "--concurrency", "0"]).unwrap();
        assert!(matches!(
            load_config(&cli).await,
            Err(BatchError::Configuration(_))
        ));
    }
}
