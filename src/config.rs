//! Configuration management with serde serialization/deserialization
//!
//! This module holds the knobs for a single capture run: where artifacts are
//! written, how long navigation may take, how the page is judged settled, and
//! how Chromium is launched.

use crate::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for a capture run
///
/// Every field has a default, so a JSON config file only needs to name the
/// values it changes.
///
/// # Examples
///
/// ```rust
/// use page_capture::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     settle_delay: Duration::from_millis(500),
///     ..Default::default()
/// };
/// assert_eq!(config.navigation_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for domain folders (default: `./captures`)
    pub output_dir: PathBuf,

    /// Upper bound for navigation and for each load-state wait (default: 30 seconds)
    pub navigation_timeout: Duration,

    /// Grace period after all load states resolve, before extraction (default: 2 seconds)
    ///
    /// Covers late asynchronous rendering such as animations and lazy content.
    pub settle_delay: Duration,

    /// How long the network must stay quiet to count as idle (default: 500ms)
    pub network_idle_window: Duration,

    /// Polling cadence for load-state checks (default: 100ms)
    pub poll_interval: Duration,

    /// Browser viewport configuration
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./captures"),
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            network_idle_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            viewport: Viewport::default(),
            chrome_path: None,
            user_agent: None,
        }
    }
}

/// Browser viewport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1280)
    pub width: u32,

    /// Viewport height in pixels (default: 720)
    pub height: u32,

    /// Device pixel ratio (default: 1.0)
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Reject configurations that would make the capture meaningless or hang.
pub fn validate_config(config: &Config) -> Result<(), CaptureError> {
    if config.navigation_timeout.is_zero() {
        return Err(CaptureError::ConfigurationError(
            "Navigation timeout must be greater than 0".to_string(),
        ));
    }

    if config.network_idle_window.is_zero() {
        return Err(CaptureError::ConfigurationError(
            "Network idle window must be greater than 0".to_string(),
        ));
    }

    if config.poll_interval.is_zero() {
        return Err(CaptureError::ConfigurationError(
            "Poll interval must be greater than 0".to_string(),
        ));
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(CaptureError::ConfigurationError(
            "Viewport dimensions must be greater than 0".to_string(),
        ));
    }

    if config.output_dir.as_os_str().is_empty() {
        return Err(CaptureError::ConfigurationError(
            "Output directory must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Generate Chrome command-line arguments based on configuration
///
/// # Examples
///
/// ```rust
/// use page_capture::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.contains(&"--headless".to_string()));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

/// Build the chromiumoxide launch configuration for one isolated session.
///
/// `profile_dir` becomes the browser's user data directory, so no state is
/// shared with other sessions.
pub fn create_browser_config(
    config: &Config,
    profile_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, CaptureError> {
    use chromiumoxide::browser::BrowserConfig;
    use chromiumoxide::handler::viewport::Viewport as ChromeViewport;

    let viewport = &config.viewport;
    let mut builder = BrowserConfig::builder()
        .window_size(viewport.width, viewport.height)
        .viewport(ChromeViewport {
            width: viewport.width,
            height: viewport.height,
            device_scale_factor: Some(viewport.device_scale_factor),
            emulating_mobile: viewport.mobile,
            is_landscape: viewport.width > viewport.height,
            has_touch: viewport.mobile,
        })
        .user_data_dir(profile_dir)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(CaptureError::ConfigurationError)
}
