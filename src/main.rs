use clap::Parser;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use web_capture::{load_config, run_until_shutdown, setup_logging, Cli, CliRunner};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    info!("Starting web-capture v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let cli_runner = CliRunner::new(config);

    // Returning normally lets the runtime drop every in-flight attempt, so
    // interrupted engines are killed. No partial report is written.
    let Some(result) = run_until_shutdown(cli_runner.run(args.command), shutdown_signal()).await
    else {
        warn!("Received shutdown signal, aborting without writing a report");
        return Ok(ExitCode::from(130));
    };

    if let Err(e) = result {
        error!("Application error: {:#}", e);
        return Ok(ExitCode::FAILURE);
    }

    info!("web-capture stopped");
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
