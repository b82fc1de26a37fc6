// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based stealth sessions using chromiumoxide.

use super::{
    BrowserLauncher, BrowserSession, STEALTH_ACCEPT_LANGUAGE, STEALTH_INIT_SCRIPT,
    STEALTH_USER_AGENT,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launch switches. The default chromiumoxide set is replaced wholesale so
/// `--enable-automation` is never passed.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-background-networking",
    "--disable-popup-blocking",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--blink-settings=imagesEnabled=false",
    "--lang=en-US",
];

static PROFILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PRICEWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRICEWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.pricewatch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".pricewatch/chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".pricewatch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".pricewatch/chromium/chrome-linux64/chrome"),
                home.join(".pricewatch/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one headless (or headed) Chromium process per session.
pub struct ChromiumLauncher {
    executable: PathBuf,
    headless: bool,
}

impl ChromiumLauncher {
    /// Use an explicit executable, or search the usual locations.
    pub fn new(executable: Option<PathBuf>, headless: bool) -> Result<Self> {
        let executable = match executable {
            Some(path) => path,
            None => find_chromium()
                .context("Chromium not found. Set PRICEWATCH_CHROMIUM_PATH or install Chrome.")?,
        };
        Ok(Self {
            executable,
            headless,
        })
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    fn browser_config(&self, profile_dir: &PathBuf) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.executable)
            .user_data_dir(profile_dir)
            .disable_default_args()
            .window_size(1366, 768)
            .request_timeout(Duration::from_secs(60))
            .arg(format!("--user-agent={STEALTH_USER_AGENT}"))
            .arg(format!("--accept-lang={STEALTH_ACCEPT_LANGUAGE}"));
        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let profile_dir = std::env::temp_dir().join(format!(
            "pricewatch-profile-{}-{}",
            std::process::id(),
            PROFILE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let config = self.browser_config(&profile_dir)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromium handler event error: {e}");
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler,
            profile_dir,
        };

        // Fall through to close() so a half-configured browser never leaks.
        match session.open_stealth_page().await {
            Ok(()) => Ok(Box::new(session)),
            Err(e) => {
                let _ = Box::new(session).close().await;
                Err(e)
            }
        }
    }
}

/// A live Chromium process with a single stealth page.
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl ChromiumSession {
    async fn open_stealth_page(&mut self) -> Result<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(STEALTH_USER_AGENT)
            .accept_language(STEALTH_ACCEPT_LANGUAGE)
            .platform("Win32")
            .build()
            .map_err(|e| anyhow::anyhow!("invalid user agent override: {e}"))?;
        page.set_user_agent(ua)
            .await
            .context("failed to override user agent")?;

        // Individual overrides are best effort; a page that rejects one is
        // still usable.
        if let Err(e) = page
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                STEALTH_INIT_SCRIPT,
            ))
            .await
        {
            warn!("stealth init script injection failed: {e}");
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        match &self.page {
            Some(page) => Ok(page),
            None => bail!("browser session has no open page"),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn reload(&mut self) -> Result<()> {
        self.page()?.reload().await.context("page reload failed")?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn html(&self) -> Result<String> {
        self.page()?.content().await.context("failed to get HTML")
    }

    async fn title(&self) -> Result<String> {
        Ok(self
            .page()?
            .get_title()
            .await
            .context("failed to get title")?
            .unwrap_or_default())
    }

    async fn url(&self) -> Result<String> {
        Ok(self
            .page()?
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        let _ = std::fs::remove_dir_all(&self.profile_dir);
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}
