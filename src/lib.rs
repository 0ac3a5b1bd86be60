//! # Page Capture
//!
//! Captures a rendered web page with headless Chromium: navigates to a URL,
//! waits for network and dynamic content to settle, then saves a full-page
//! PNG screenshot, the post-JavaScript HTML and a JSON metadata sidecar into
//! a folder named after the site's domain.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Argument validation | [`cli`] | validated URL |
//! | Page capture | [`capture_service`] | [`CaptureResult`] |
//! | Persistence | [`persist`] | [`SavedFiles`] |
//!
//! The capturer owns one browser session per call and closes it on every
//! exit path, including navigation timeouts.
//!
//! ## Output layout
//!
//! ```text
//! captures/example.com/capture-2026-10-16T09-30-12-345.png
//! captures/example.com/capture-2026-10-16T09-30-12-345.html
//! captures/example.com/capture-2026-10-16T09-30-12-345-metadata.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use page_capture::{save_capture, ChromiumLauncher, Config, PageCapturer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let capturer = PageCapturer::new(ChromiumLauncher::new(config.clone()), config.clone());
//!
//!     let result = capturer.capture("https://example.com").await?;
//!     let saved = save_capture(&result, &config.output_dir).await?;
//!     println!("Screenshot written to {}", saved.screenshot.display());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! page-capture https://example.com
//! page-capture https://example.com --output-dir ./snapshots --timeout 60 --settle-ms 5000
//! ```

/// Configuration and Chrome launch settings
pub mod config;

/// Error types
pub mod error;

/// Browser session seam and the Chromium implementation
pub mod browser;

/// Single-page capture pipeline
pub mod capture_service;

/// Writing captures to domain folders
pub mod persist;

/// Command-line interface implementation
pub mod cli;

/// Utility functions and helpers
pub mod utils;


pub use browser::*;
pub use capture_service::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use persist::*;
pub use utils::*;
