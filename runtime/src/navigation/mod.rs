// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stealth navigation engine.
//!
//! Drives one exclusively-owned browser session to a target URL while
//! working around anti-bot interstitials:
//!
//! 1. Randomized pause, then navigate
//! 2. Wait for `document.readyState == "complete"` (bounded), then settle
//! 3. Look for challenge markers in the rendered markup
//! 4. On a challenge: wait, force-refresh, wait, re-check
//! 5. Between failed attempts: long cooldown, and from the second failure
//!    on, a full session restart
//!
//! Exhaustion is reported as `false`, not as an error, so the caller picks
//! the fallback.

pub mod content;
pub mod pacer;

pub use content::PageContent;

use crate::error::{ScrapeError, ScrapeResult};
use crate::renderer::{BrowserLauncher, BrowserSession};
use content::{
    ElementInfo, PageSnapshot, READY_STATE_SCRIPT, ROOT_CANDIDATES_SCRIPT, SNAPSHOT_SCRIPT,
};
use pacer::Pacer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lower-cased phrases that identify an anti-automation interstitial.
pub const CHALLENGE_MARKERS: &[&str] = &["incapsula", "incident id", "request unsuccessful"];

/// Tunables for the navigation state machine.
#[derive(Debug, Clone)]
pub struct NavigationSettings {
    pub max_retries: u32,
    /// Bound on waiting for the page's ready signal.
    pub page_load_timeout: Duration,
    pub element_timeout: Duration,
    /// Interval between ready-state and visibility probes.
    pub poll_interval: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            page_load_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Scoped ownership of one browser session.
///
/// Call [`SessionGuard::release`] on every path. If a guard is dropped
/// without being released (a panic, a cancelled future) the session is
/// closed on a background task instead.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Close the session and wait for the browser to exit.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("failed to close browser session: {e:#}");
            }
        }
    }

    async fn close_current(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("failed to close browser session: {e:#}");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = session.close().await {
                            warn!("failed to close abandoned browser session: {e:#}");
                        }
                    });
                }
                Err(_) => warn!("browser session dropped outside a runtime; process may leak"),
            }
        }
    }
}

/// Navigation engine over a pluggable launcher and pacer.
pub struct Navigator {
    launcher: Arc<dyn BrowserLauncher>,
    pacer: Arc<dyn Pacer>,
    settings: NavigationSettings,
}

impl Navigator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        pacer: Arc<dyn Pacer>,
        settings: NavigationSettings,
    ) -> Self {
        Self {
            launcher,
            pacer,
            settings,
        }
    }

    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    /// Launch a stealth-configured browser session.
    pub async fn create_session(&self) -> ScrapeResult<SessionGuard> {
        let session = self
            .launcher
            .launch()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        Ok(SessionGuard::new(session))
    }

    /// Navigate with the configured retry bound.
    pub async fn navigate(&self, guard: &mut SessionGuard, url: &str) -> bool {
        self.navigate_with_retries(guard, url, self.settings.max_retries)
            .await
    }

    /// Try up to `max_retries` times to land on `url` without a persistent
    /// challenge. Returns `true` on the first clean attempt.
    pub async fn navigate_with_retries(
        &self,
        guard: &mut SessionGuard,
        url: &str,
        max_retries: u32,
    ) -> bool {
        for attempt in 0..max_retries {
            info!(url, attempt = attempt + 1, max_retries, "navigation attempt");

            match self.attempt(guard, url).await {
                Ok(()) => {
                    info!(url, attempt = attempt + 1, "navigation succeeded");
                    return true;
                }
                Err(e) => warn!(url, attempt = attempt + 1, "navigation attempt failed: {e}"),
            }

            if attempt + 1 < max_retries {
                self.pacer.pause(pacer::RETRY_COOLDOWN).await;
                if attempt > 0 {
                    if let Err(e) = self.restart_session(guard).await {
                        error!(url, "session restart failed: {e}");
                        return false;
                    }
                }
            }
        }

        error!(url, max_retries, "navigation exhausted all attempts");
        false
    }

    /// One navigation attempt. Any error fails the attempt.
    async fn attempt(&self, guard: &mut SessionGuard, url: &str) -> ScrapeResult<()> {
        self.pacer.pause(pacer::PRE_NAVIGATION).await;

        let timeout = self.settings.page_load_timeout;
        {
            let session = active(guard)?;
            session
                .goto(url, timeout)
                .await
                .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        }

        self.wait_until_ready(guard).await?;
        self.pacer.pause(pacer::SETTLE).await;

        if !self.challenged(guard).await? {
            return Ok(());
        }

        warn!(url, "challenge page detected, waiting before refresh");
        self.pacer.pause(pacer::CHALLENGE_WAIT).await;
        {
            let session = active(guard)?;
            session
                .reload()
                .await
                .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        }
        self.pacer.pause(pacer::POST_REFRESH).await;

        if self.challenged(guard).await? {
            return Err(ScrapeError::Browser(
                "challenge persisted after refresh".to_string(),
            ));
        }
        info!(url, "challenge cleared after refresh");
        Ok(())
    }

    /// Poll the ready state until complete or the page-load bound elapses.
    /// A timeout is logged and tolerated; the challenge check decides.
    async fn wait_until_ready(&self, guard: &mut SessionGuard) -> ScrapeResult<()> {
        let deadline = Instant::now() + self.settings.page_load_timeout;
        loop {
            let state = active(guard)?
                .evaluate(READY_STATE_SCRIPT)
                .await
                .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.settings.page_load_timeout.as_millis() as u64,
                    "page did not report ready in time, continuing"
                );
                return Ok(());
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn challenged(&self, guard: &mut SessionGuard) -> ScrapeResult<bool> {
        let html = active(guard)?
            .html()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        Ok(contains_challenge(&html))
    }

    async fn restart_session(&self, guard: &mut SessionGuard) -> ScrapeResult<()> {
        info!("restarting browser session");
        guard.close_current().await;
        self.pacer.pause(pacer::SESSION_RESTART).await;
        let session = self
            .launcher
            .launch()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        guard.session = Some(session);
        Ok(())
    }

    /// Wait for `selector` to match a visible element.
    ///
    /// A bare `"root"` is treated as `"#root"`.
    pub async fn wait_for_element(
        &self,
        guard: &SessionGuard,
        selector: &str,
        timeout: Duration,
    ) -> ScrapeResult<ElementInfo> {
        let selector = normalize_selector(selector);
        let script = content::visible_element_script(&selector);
        let session = active_ref(guard)?;
        let deadline = Instant::now() + timeout;

        loop {
            match session.evaluate(&script).await {
                Ok(value) if !value.is_null() => {
                    let element: ElementInfo = serde_json::from_value(value)?;
                    debug!(selector = %selector, tag = %element.tag, "element visible");
                    self.pacer.pause(pacer::ELEMENT_FOUND).await;
                    return Ok(element);
                }
                Ok(_) => {}
                Err(e) => debug!(selector = %selector, "visibility probe failed: {e:#}"),
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        log_timeout_diagnostics(session, &selector).await;
        Err(ScrapeError::ElementNotFound {
            selector,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// Snapshot the loaded page after a short settle.
    pub async fn extract_all(&self, guard: &SessionGuard) -> ScrapeResult<PageContent> {
        self.pacer.pause(pacer::PRE_EXTRACT).await;
        let session = active_ref(guard)?;
        let browser_err = |e: anyhow::Error| ScrapeError::Browser(format!("{e:#}"));

        let title = session.title().await.map_err(browser_err)?;
        let url = session.url().await.map_err(browser_err)?;
        let html = session.html().await.map_err(browser_err)?;
        let raw = session
            .evaluate(SNAPSHOT_SCRIPT)
            .await
            .map_err(browser_err)?;
        let snapshot: PageSnapshot = if raw.is_null() {
            PageSnapshot::default()
        } else {
            serde_json::from_value(raw)?
        };

        Ok(PageContent::from_snapshot(title, url, html, snapshot))
    }
}

fn active(guard: &mut SessionGuard) -> ScrapeResult<&mut Box<dyn BrowserSession>> {
    guard
        .session
        .as_mut()
        .ok_or_else(|| ScrapeError::Browser("browser session is not active".to_string()))
}

fn active_ref(guard: &SessionGuard) -> ScrapeResult<&dyn BrowserSession> {
    guard
        .session
        .as_deref()
        .ok_or_else(|| ScrapeError::Browser("browser session is not active".to_string()))
}

/// Case-insensitive check for any known challenge marker.
pub fn contains_challenge(html: &str) -> bool {
    let lower = html.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn normalize_selector(selector: &str) -> String {
    if selector == "root" {
        "#root".to_string()
    } else {
        selector.to_string()
    }
}

async fn log_timeout_diagnostics(session: &dyn BrowserSession, selector: &str) {
    let title = session.title().await.unwrap_or_default();
    let url = session.url().await.unwrap_or_default();
    let candidates: Vec<ElementInfo> = match session.evaluate(ROOT_CANDIDATES_SCRIPT).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    let summary: Vec<String> = candidates
        .iter()
        .map(|c| format!("<{} id='{}' class='{}'>", c.tag.to_lowercase(), c.id, c.class))
        .collect();
    warn!(
        selector,
        title = %title,
        url = %url,
        root_candidates = %summary.join(", "),
        "element wait timed out"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_markers_case_insensitive() {
        assert!(contains_challenge("<title>Request unsuccessful. Incapsula incident ID: 1</title>"));
        assert!(contains_challenge("<p>INCIDENT ID 42</p>"));
        assert!(!contains_challenge("<ul><li class=\"product\">Scooter</li></ul>"));
    }

    #[test]
    fn test_normalize_root_selector() {
        assert_eq!(normalize_selector("root"), "#root");
        assert_eq!(normalize_selector("#root"), "#root");
        assert_eq!(normalize_selector("div.root"), "div.root");
    }

    #[test]
    fn test_default_settings() {
        let settings = NavigationSettings::default();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.element_timeout, Duration::from_secs(30));
    }
}
