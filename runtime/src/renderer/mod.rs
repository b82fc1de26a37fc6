// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser abstraction for stealth page rendering.
//!
//! Defines the `BrowserLauncher` and `BrowserSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide). The
//! navigation engine only talks to these traits, so its retry and
//! challenge handling can be driven by a scripted session in tests.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Realistic desktop user agent presented by stealth sessions.
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

pub const STEALTH_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Script injected before any page script runs, hiding the usual
/// automation fingerprints.
pub const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', {get: () => undefined});
Object.defineProperty(navigator, 'plugins', {get: () => [1, 2, 3, 4, 5]});
Object.defineProperty(navigator, 'languages', {get: () => ['en-US', 'en']});
Object.defineProperty(navigator, 'platform', {get: () => 'Win32'});
window.chrome = { runtime: {} };
"#;

/// Launches isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start a fresh browser instance with one page, stealth-configured.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One exclusively-owned browser instance with a single page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the page, failing if the navigation does not commit in time.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()>;
    /// Force-reload the current page.
    async fn reload(&mut self) -> Result<()>;
    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Full rendered markup of the page.
    async fn html(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    async fn url(&self) -> Result<String>;
    /// Tear down the page and the browser process.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A launcher used when Chromium is unavailable.
///
/// HTTP and structured-query strategies keep working; the browser-driven
/// strategy fails on every attempt and the selector moves on.
pub struct NoopLauncher;

#[async_trait]
impl BrowserLauncher for NoopLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        Err(anyhow::anyhow!("browser not available (HTTP-only mode)"))
    }
}
