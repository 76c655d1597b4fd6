//! # Web Capture
//!
//! Batch capture of web pages: for every target listed in a text file, load
//! the page in a real browser engine, save a screenshot and the rendered page
//! source, and finally write one static HTML report covering every target.
//!
//! ## Pipeline
//!
//! ```text
//! input lines -> TargetNormalizer -> FallbackOrchestrator -> ResultAggregator -> ReportGenerator
//! ```
//!
//! Each target is tried against an ordered list of capture backends, by
//! default a fast headless renderer followed by a full windowed browser.
//! The first success wins. A failing, hanging or crashing backend only ever
//! produces a failed attempt; the batch always finishes and always lists
//! every target exactly once, in input order.
//!
//! ## Output layout
//!
//! ```text
//! <output_root>/<identifier>/screenshot.png
//! <output_root>/<identifier>/page_source.html
//! report.html
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use web_capture::{run_batch, backends_from_config, Config, FallbackOrchestrator, Metrics};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let metrics = Arc::new(Metrics::new());
//!     let orchestrator =
//!         FallbackOrchestrator::new(&config, backends_from_config(&config), metrics.clone());
//!
//!     let report = run_batch(&config, orchestrator, metrics).await?;
//!     println!("{} of {} targets captured", report.captured(), report.total());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! web-capture capture --input input.txt --output screenshots --report report.html
//! web-capture capture --input input.txt --concurrency 4 --backends fast,full --headless-full
//! web-capture validate --config capture.json
//! ```

/// Configuration and settings for a capture run
pub mod config;

/// Error types for attempts, targets and whole runs
pub mod error;

/// Turning raw input lines into capture targets
pub mod target;

/// The capture backend contract and attempt types
pub mod backend;

/// Chrome engine sessions shared by the renderers
pub mod engine;

/// Fast and full browser renderers
pub mod renderers;

/// Per-target fallback across backends
pub mod orchestrator;

/// Capture results and the ordered report
pub mod aggregator;

/// HTML and JSON report rendering
pub mod report;

/// Sequential and pooled batch execution
pub mod batch;

/// Command-line interface implementation
pub mod cli;

/// Capture metrics and progress tracking
pub mod metrics;

/// Utility functions and helpers
pub mod utils;


pub use aggregator::*;
pub use backend::*;
pub use batch::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use orchestrator::*;
pub use renderers::*;
pub use report::*;
pub use target::*;
pub use utils::*;
