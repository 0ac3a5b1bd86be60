//! Headless browser sessions
//!
//! The capture pipeline talks to the browser through two seams:
//! [`BrowserLauncher`] starts one isolated browser and hands back a
//! [`PageSession`], which owns that browser until [`PageSession::close`].
//! The Chromium implementation drives Chrome over the DevTools protocol via
//! chromiumoxide.

use crate::{create_browser_config, CaptureError, Config, PageInfo};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Page lifecycle milestones that can be awaited after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// `document.readyState` has left `loading`
    DomContentLoaded,
    /// `document.readyState` is `complete`
    Load,
    /// Load is complete and no request has been in flight for the idle window
    NetworkIdle,
}

/// One browser instance with (at most) one page, owned by a single capture.
#[async_trait]
pub trait PageSession: Send {
    /// Open a blank tab to drive.
    async fn open_page(&mut self) -> Result<(), CaptureError>;

    /// Navigate the tab and wait for the navigation to commit and load.
    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError>;

    /// Resolve once the page reaches `state`. Unbounded; callers add the timeout.
    async fn wait_for_load_state(&mut self, state: LoadState) -> Result<(), CaptureError>;

    /// PNG of the entire scrollable document.
    async fn screenshot_full_page(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Serialized DOM as it currently stands.
    async fn content(&mut self) -> Result<String, CaptureError>;

    async fn title(&mut self) -> Result<String, CaptureError>;

    async fn page_info(&mut self) -> Result<PageInfo, CaptureError>;

    /// Tear the browser down. Must be safe to call after any failed step.
    async fn close(&mut self) -> Result<(), CaptureError>;
}

/// Starts isolated browser sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>, CaptureError>;
}

/// Launches a fresh headless Chromium per session, each with its own profile.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: Config,
}

impl ChromiumLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn profile_dir() -> PathBuf {
        std::env::temp_dir().join(format!(
            "page-capture-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>, CaptureError> {
        let profile_dir = Self::profile_dir();
        tokio::fs::create_dir_all(&profile_dir).await.map_err(|e| {
            CaptureError::BrowserLaunchFailed(format!("Failed to create profile dir: {e}"))
        })?;

        let launched = match create_browser_config(&self.config, &profile_dir) {
            Ok(browser_config) => Browser::launch(browser_config)
                .await
                .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string())),
            Err(e) => Err(e),
        };

        let (browser, mut handler) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile_dir(&profile_dir).await;
                return Err(e);
            }
        };

        // The handler is a Stream that must be polled for any CDP command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Handler error: {}", e);
                }
            }
            debug!("Handler stream ended");
        });

        info!("Chromium launched (profile {})", profile_dir.display());

        Ok(Box::new(ChromiumSession {
            browser,
            handler: handler_task,
            page: None,
            network: Arc::new(Mutex::new(NetworkActivity::new(Instant::now()))),
            network_task: None,
            profile_dir,
            poll_interval: self.config.poll_interval,
            idle_window: self.config.network_idle_window,
            closed: false,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    network: Arc<Mutex<NetworkActivity>>,
    network_task: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    poll_interval: Duration,
    idle_window: Duration,
    closed: bool,
}

/// In-flight request bookkeeping fed by the page's `Network` domain events.
#[derive(Debug)]
struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    /// Redirects reuse the request id, so a hop only refreshes the timer.
    fn request_started(&mut self, request_id: String, now: Instant) {
        self.in_flight.insert(request_id);
        self.last_change = now;
    }

    /// Requests that started before tracking began are ignored.
    fn request_settled(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    /// How long the page has had zero requests in flight, if it has none.
    fn idle_for(&self, now: Instant) -> Option<Duration> {
        if self.in_flight.is_empty() {
            Some(now.saturating_duration_since(self.last_change))
        } else {
            None
        }
    }
}

const READY_STATE_JS: &str = "document.readyState";

const PAGE_INFO_JS: &str = "JSON.stringify({ \
    width: window.innerWidth, \
    height: window.innerHeight, \
    documentHeight: document.documentElement.scrollHeight, \
    documentWidth: document.documentElement.scrollWidth \
})";

impl ChromiumSession {
    fn page(&self) -> Result<&Page, CaptureError> {
        self.page
            .as_ref()
            .ok_or_else(|| CaptureError::PageError("No page open".to_string()))
    }

    async fn evaluate_json<T: serde::de::DeserializeOwned>(
        &self,
        expression: &str,
    ) -> Result<T, CaptureError> {
        let raw: String = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(|e| CaptureError::EvaluationFailed(e.to_string()))?
            .into_value()
            .map_err(|e| CaptureError::EvaluationFailed(e.to_string()))?;

        serde_json::from_str(&raw).map_err(|e| CaptureError::EvaluationFailed(e.to_string()))
    }

    async fn ready_state(&self) -> Result<String, CaptureError> {
        self.page()?
            .evaluate(READY_STATE_JS)
            .await
            .map_err(|e| CaptureError::LoadStateFailed(e.to_string()))?
            .into_value()
            .map_err(|e| CaptureError::LoadStateFailed(e.to_string()))
    }

    async fn wait_for_ready_state(&self, accept: &[&str]) -> Result<(), CaptureError> {
        loop {
            let ready = self.ready_state().await?;
            if accept.contains(&ready.as_str()) {
                return Ok(());
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Idle once the document is complete and no request has been in flight
    /// for a full idle window.
    async fn wait_for_network_idle(&self) -> Result<(), CaptureError> {
        loop {
            let complete = self.ready_state().await? == "complete";
            let idle_for = self.network.lock().await.idle_for(Instant::now());

            match idle_for {
                Some(quiet) if complete && quiet >= self.idle_window => {
                    debug!("Network idle for {:?}", quiet);
                    return Ok(());
                }
                _ => sleep(self.poll_interval).await,
            }
        }
    }

    /// Subscribe to request lifecycle events before any navigation happens.
    async fn track_network(&mut self) -> Result<(), CaptureError> {
        let page = self.page()?;
        let map_err = |e: chromiumoxide::error::CdpError| CaptureError::PageError(e.to_string());

        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(map_err)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(map_err)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(map_err)?;
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(map_err)?;

        let network = Arc::clone(&self.network);
        self.network_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = started.next() => {
                        network
                            .lock()
                            .await
                            .request_started(event.request_id.inner().clone(), Instant::now());
                    }
                    Some(event) = finished.next() => {
                        network
                            .lock()
                            .await
                            .request_settled(event.request_id.inner(), Instant::now());
                    }
                    Some(event) = failed.next() => {
                        network
                            .lock()
                            .await
                            .request_settled(event.request_id.inner(), Instant::now());
                    }
                    else => break,
                }
            }
            debug!("Network event streams ended");
        }));

        Ok(())
    }

    fn stop_tasks(&mut self) {
        if let Some(task) = self.network_task.take() {
            task.abort();
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn open_page(&mut self) -> Result<(), CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;
        self.page = Some(page);
        self.track_network().await
    }

    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| CaptureError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState) -> Result<(), CaptureError> {
        debug!("Waiting for load state {:?}", state);
        match state {
            LoadState::DomContentLoaded => {
                self.wait_for_ready_state(&["interactive", "complete"]).await
            }
            LoadState::Load => self.wait_for_ready_state(&["complete"]).await,
            LoadState::NetworkIdle => self.wait_for_network_idle().await,
        }
    }

    async fn screenshot_full_page(&mut self) -> Result<Vec<u8>, CaptureError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        self.page()?
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))
    }

    async fn content(&mut self) -> Result<String, CaptureError> {
        self.page()?
            .content()
            .await
            .map_err(|e| CaptureError::ContentFailed(e.to_string()))
    }

    async fn title(&mut self) -> Result<String, CaptureError> {
        let title = self
            .page()?
            .get_title()
            .await
            .map_err(|e| CaptureError::EvaluationFailed(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn page_info(&mut self) -> Result<PageInfo, CaptureError> {
        self.evaluate_json(PAGE_INFO_JS).await
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }

        let result = match self.browser.close().await {
            Ok(_) => {
                if let Err(e) = self.browser.wait().await {
                    warn!("Waiting for browser exit failed: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                // Fall back to killing the process so nothing is leaked
                if let Some(Err(kill_err)) = self.browser.kill().await {
                    warn!("Browser kill failed: {}", kill_err);
                }
                Err(CaptureError::CloseFailed(e.to_string()))
            }
        };

        self.stop_tasks();
        remove_profile_dir(&self.profile_dir).await;
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed {
            // Dropped mid-capture: the child is spawned with kill_on_drop,
            // so dropping `browser` reaps the process.
            warn!("Browser session dropped without close, killing browser");
            self.stop_tasks();
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
    }
}

async fn remove_profile_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        debug!("Could not remove profile dir {}: {}", dir.display(), e);
    }
}
