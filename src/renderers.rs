//! The two capture backends
//!
//! Both drive Chrome through [`crate::engine`]; they differ only in how the
//! engine is launched and what is captured.

use crate::engine::{run_attempt, EngineProfile};
use crate::{BackendKind, CaptureAttempt, CaptureBackend, Config};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Headless engine capturing the visible viewport.
pub struct FastRenderer {
    config: Config,
}

impl FastRenderer {
    const PROFILE: EngineProfile = EngineProfile {
        headless: true,
        full_page: false,
        await_navigation: false,
    };

    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CaptureBackend for FastRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Fast
    }

    fn screenshot_file_name(&self) -> String {
        self.config.screenshot_file_name()
    }

    async fn capture(&self, address: &str, output_dir: &Path, timeout: Duration) -> CaptureAttempt {
        run_attempt(
            self.kind(),
            Self::PROFILE,
            &self.config,
            address,
            output_dir,
            timeout,
        )
        .await
    }
}

/// Windowed engine capturing the whole scrollable page.
///
/// Heavier than [`FastRenderer`] but copes with pages that refuse to render
/// for headless clients.
pub struct FullBrowserRenderer {
    config: Config,
    profile: EngineProfile,
}

impl FullBrowserRenderer {
    pub fn new(config: Config) -> Self {
        let profile = EngineProfile {
            headless: config.full_browser_headless,
            full_page: true,
            await_navigation: true,
        };
        Self { config, profile }
    }
}

#[async_trait]
impl CaptureBackend for FullBrowserRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Full
    }

    fn screenshot_file_name(&self) -> String {
        self.config.screenshot_file_name()
    }

    async fn capture(&self, address: &str, output_dir: &Path, timeout: Duration) -> CaptureAttempt {
        run_attempt(
            self.kind(),
            self.profile,
            &self.config,
            address,
            output_dir,
            timeout,
        )
        .await
    }
}

/// Builds the backends named in `config.backend_order`, in that order.
pub fn backends_from_config(config: &Config) -> Vec<Arc<dyn CaptureBackend>> {
    config
        .backend_order
        .iter()
        .map(|kind| -> Arc<dyn CaptureBackend> {
            match kind {
                BackendKind::Fast => Arc::new(FastRenderer::new(config.clone())),
                BackendKind::Full => Arc::new(FullBrowserRenderer::new(config.clone())),
            }
        })
        .collect()
}
