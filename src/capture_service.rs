//! Page capture orchestration
//!
//! [`PageCapturer`] runs one complete capture of a single URL: launch,
//! navigate, wait for the page to settle, screenshot, extract the rendered
//! HTML and read page geometry. The browser session it launches is closed on
//! every exit path.

use crate::{iso_timestamp, BrowserLauncher, CaptureError, Config, LoadState, PageSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Viewport and full-document dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub width: u32,
    pub height: u32,
    pub document_width: u32,
    pub document_height: u32,
}

/// Everything captured from one page. Only built after every step succeeded.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub url: String,
    pub title: String,
    pub html: String,
    /// PNG bytes covering the full document height
    pub screenshot: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub page_info: PageInfo,
    /// Wall time from launch to the last extraction step
    pub duration: Duration,
}

impl CaptureResult {
    /// ISO-8601 capture instant, millisecond precision, UTC.
    pub fn timestamp_iso(&self) -> String {
        iso_timestamp(self.timestamp)
    }
}

/// Captures a single page through a [`BrowserLauncher`].
///
/// # Examples
///
/// ```rust,no_run
/// use page_capture::{ChromiumLauncher, Config, PageCapturer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let capturer = PageCapturer::new(ChromiumLauncher::new(config.clone()), config);
///
///     let result = capturer.capture("https://example.com").await?;
///     println!("Captured {} ({} bytes of HTML)", result.title, result.html.len());
///     Ok(())
/// }
/// ```
pub struct PageCapturer<L: BrowserLauncher> {
    launcher: L,
    config: Config,
}

impl<L: BrowserLauncher> PageCapturer<L> {
    pub fn new(launcher: L, config: Config) -> Self {
        Self { launcher, config }
    }

    pub async fn capture(&self, url: &str) -> Result<CaptureResult, CaptureError> {
        let start_time = tokio::time::Instant::now();

        info!("Step 1: launching headless browser");
        let mut session = self.launcher.launch().await?;

        let outcome = self.run_steps(&mut *session, url).await;
        let captured_at = Utc::now();
        let duration = start_time.elapsed();

        info!("Closing browser");
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok((title, html, screenshot, page_info)), closed) => {
                if let Err(e) = closed {
                    warn!("Browser did not close cleanly: {}", e);
                }
                Ok(CaptureResult {
                    url: url.to_string(),
                    title,
                    html,
                    screenshot,
                    timestamp: captured_at,
                    page_info,
                    duration,
                })
            }
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("Browser did not close cleanly after failure: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<(String, String, Vec<u8>, PageInfo), CaptureError> {
        let limit = self.config.navigation_timeout;

        info!("Step 2: opening page");
        session.open_page().await?;

        info!("Step 3: navigating to {}", url);
        bounded(limit, async {
            session.navigate(url).await?;
            session.wait_for_load_state(LoadState::NetworkIdle).await?;
            Ok::<(), CaptureError>(())
        })
        .await?;
        info!("Page loaded");

        info!("Step 4: waiting for dynamic content");
        bounded(limit, session.wait_for_load_state(LoadState::NetworkIdle)).await?;
        bounded(limit, session.wait_for_load_state(LoadState::DomContentLoaded)).await?;
        debug!("Settling for {:?}", self.config.settle_delay);
        sleep(self.config.settle_delay).await;

        info!("Step 5: capturing full-page screenshot");
        let screenshot = session.screenshot_full_page().await?;
        debug!("Screenshot is {} bytes", screenshot.len());

        info!("Step 6: extracting rendered HTML");
        let html = session.content().await?;

        info!("Step 7: collecting page metadata");
        let title = session.title().await?;
        let page_info = session.page_info().await?;

        Ok((title, html, screenshot, page_info))
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, CaptureError>
where
    F: Future<Output = Result<T, CaptureError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CaptureError::Timeout(limit)),
    }
}
