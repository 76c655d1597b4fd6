//! Chrome engine sessions shared by both renderers
//!
//! Every attempt launches its own browser with a throwaway profile
//! directory, drives one page, and tears the browser down again. No engine
//! state survives an attempt.

use crate::{
    ArtifactPaths, BackendKind, CaptureAttempt, CaptureError, Config, OutputFormat, Viewport,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

/// How long a graceful browser close may take before the process is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Upper bound of [`EngineSession::shutdown`]: close, then wait, each
/// bounded by `CLOSE_GRACE`.
pub const TEARDOWN_BUDGET: Duration = Duration::from_secs(6);

/// Launch and capture characteristics of a renderer.
#[derive(Debug, Clone, Copy)]
pub struct EngineProfile {
    pub headless: bool,
    pub full_page: bool,
    /// Wait for the navigation to report completion before settling
    pub await_navigation: bool,
}

/// Both payloads of a successful capture, held in memory until written.
#[derive(Debug)]
pub struct PageSnapshot {
    pub screenshot: Vec<u8>,
    pub markup: String,
}

/// Chrome command-line arguments shared by both renderers
pub fn chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-infobars".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--ignore-certificate-errors".to_string(),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    profile: &EngineProfile,
    profile_dir: &Path,
) -> Result<BrowserConfig, CaptureError> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .user_data_dir(profile_dir)
        .args(chrome_args(config));

    if !profile.headless {
        builder = builder.with_head();
    }

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(CaptureError::BrowserLaunchFailed)
}

/// A running browser and the task pumping its DevTools connection.
pub struct EngineSession {
    browser: Browser,
    handler: JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
}

impl EngineSession {
    pub async fn launch(browser_config: BrowserConfig) -> Result<Self, CaptureError> {
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler must be polled for any page command to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Engine handler error: {}", e);
                    return Err(e);
                }
            }
            Ok(())
        });

        Ok(Self { browser, handler })
    }

    /// Navigates, waits for the page to settle, and captures both payloads.
    pub async fn snapshot(
        &self,
        address: &str,
        profile: &EngineProfile,
        viewport: &Viewport,
        settle_delay: Duration,
    ) -> Result<PageSnapshot, CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::EngineCrashed(e.to_string()))?;

        let result = self
            .snapshot_page(&page, address, profile, viewport, settle_delay)
            .await;

        if let Err(e) = page.close().await {
            debug!("Could not close page for {}: {}", address, e);
        }
        result
    }

    async fn snapshot_page(
        &self,
        page: &Page,
        address: &str,
        profile: &EngineProfile,
        viewport: &Viewport,
        settle_delay: Duration,
    ) -> Result<PageSnapshot, CaptureError> {
        let emulation_params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width)
            .height(viewport.height)
            .device_scale_factor(viewport.device_scale_factor)
            .mobile(viewport.mobile)
            .build()
            .map_err(CaptureError::EngineCrashed)?;

        page.execute(emulation_params)
            .await
            .map_err(|e| CaptureError::EngineCrashed(e.to_string()))?;

        page.goto(address)
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;

        if profile.await_navigation {
            page.wait_for_navigation()
                .await
                .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;
        }

        sleep(settle_delay).await;

        let screenshot_params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(profile.full_page)
            .build();

        let screenshot = page
            .screenshot(screenshot_params)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let markup = page
            .content()
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        Ok(PageSnapshot { screenshot, markup })
    }

    /// Closes the browser, killing it if it does not exit promptly.
    pub async fn shutdown(mut self) {
        let closed = matches!(timeout(CLOSE_GRACE, self.browser.close()).await, Ok(Ok(_)));
        if closed {
            let _ = timeout(CLOSE_GRACE, self.browser.wait()).await;
        } else {
            warn!("Browser did not close cleanly, killing it");
            let _ = self.browser.kill().await;
        }
        self.handler.abort();
    }

    /// Force-terminates the browser process.
    pub async fn kill(mut self) {
        if let Some(Err(e)) = self.browser.kill().await {
            warn!("Failed to kill browser process: {}", e);
        }
        self.handler.abort();
    }
}

/// Transcodes the engine's PNG into the configured screenshot format
pub fn encode_screenshot(png_data: Vec<u8>, format: OutputFormat) -> Result<Vec<u8>, CaptureError> {
    let image_format = match format {
        OutputFormat::Png => return Ok(png_data),
        OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        OutputFormat::Webp => image::ImageFormat::WebP,
    };

    let img = image::load_from_memory(&png_data)?;
    let mut encoded = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut encoded), image_format)?;
    Ok(encoded)
}

/// Runs one complete attempt for a renderer: launch, snapshot, write,
/// teardown. Every failure is folded into the returned attempt.
pub async fn run_attempt(
    kind: BackendKind,
    profile: EngineProfile,
    config: &Config,
    address: &str,
    output_dir: &Path,
    attempt_timeout: Duration,
) -> CaptureAttempt {
    let start = Instant::now();
    let artifacts = ArtifactPaths::in_dir(output_dir, &config.screenshot_file_name());
    let profile_dir = std::env::temp_dir().join(format!(
        "web-capture-{}-{}",
        std::process::id(),
        uuid::Uuid::new_v4()
    ));

    let result = attempt(
        &profile,
        config,
        address,
        &artifacts,
        &profile_dir,
        attempt_timeout,
    )
    .await;

    if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await {
        debug!("Could not remove profile dir {}: {}", profile_dir.display(), e);
    }

    match result {
        Ok(()) => {
            info!("{} captured {}", kind, address);
            CaptureAttempt::succeeded(kind, artifacts, start.elapsed())
        }
        Err(e) => CaptureAttempt::failed(kind, e, artifacts, start.elapsed()),
    }
}

async fn attempt(
    profile: &EngineProfile,
    config: &Config,
    address: &str,
    artifacts: &ArtifactPaths,
    profile_dir: &Path,
    attempt_timeout: Duration,
) -> Result<(), CaptureError> {
    let deadline = tokio::time::Instant::now() + attempt_timeout;
    let browser_config = create_browser_config(config, profile, profile_dir)?;

    let session = timeout_at(deadline, EngineSession::launch(browser_config))
        .await
        .map_err(|_| CaptureError::Timeout(attempt_timeout))??;

    let snapshot = timeout_at(
        deadline,
        session.snapshot(address, profile, &config.viewport, config.settle_delay),
    )
    .await;

    match snapshot {
        Ok(Ok(snapshot)) => {
            // Artifacts land before teardown so a slow close cannot lose them
            let written = persist_snapshot(snapshot, config.screenshot_format, artifacts).await;
            session.shutdown().await;
            written
        }
        Ok(Err(e)) => {
            session.shutdown().await;
            Err(e)
        }
        Err(_) => {
            session.kill().await;
            Err(CaptureError::Timeout(attempt_timeout))
        }
    }
}

/// Encodes the screenshot, then writes both artifacts.
async fn persist_snapshot(
    snapshot: PageSnapshot,
    format: OutputFormat,
    artifacts: &ArtifactPaths,
) -> Result<(), CaptureError> {
    let screenshot = encode_screenshot(snapshot.screenshot, format)?;
    tokio::fs::write(&artifacts.screenshot, &screenshot).await?;
    tokio::fs::write(&artifacts.dom_snapshot, snapshot.markup.as_bytes()).await?;
    Ok(())
}
