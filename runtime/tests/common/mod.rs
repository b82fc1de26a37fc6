// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scripted browser doubles shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use pricewatch_runtime::navigation::content::{READY_STATE_SCRIPT, VISIBLE_PROBE_MARKER};
use pricewatch_runtime::navigation::pacer::InstantPacer;
use pricewatch_runtime::navigation::{NavigationSettings, Navigator};
use pricewatch_runtime::renderer::{BrowserLauncher, BrowserSession};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CHALLENGE_HTML: &str =
    "<html><head><title>Request unsuccessful. Incapsula incident ID: 7</title></head></html>";

pub const LISTING_HTML: &str = r#"<html><head><title>Scooters</title></head><body>
<ol class="products list items product-items">
  <li class="item product product-item" data-product-sku="SC-100">
    <strong class="product name product-item-name">Xiaomi Electric Scooter 4</strong>
    <span id="product-price-100"><span class="price">1,299</span></span>
  </li>
  <li class="item product product-item" data-product-sku="SC-200">
    <strong class="product name product-item-name">Segway Ninebot E2</strong>
    <span id="product-price-200"><span class="price">899</span></span>
  </li>
</ol></body></html>"#;

/// Counters shared between a launcher and every session it created.
#[derive(Default)]
pub struct BrowserLog {
    pub launches: AtomicUsize,
    pub gotos: AtomicUsize,
    pub reloads: AtomicUsize,
    pub closes: AtomicUsize,
    /// Markup served by successive `goto`/`reload` calls.
    pages: Mutex<VecDeque<String>>,
    /// Served once `pages` runs dry.
    fallback: Mutex<String>,
    /// Whether visibility probes find an element.
    pub element_visible: Mutex<bool>,
}

impl BrowserLog {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_page(&self) -> String {
        match self.pages.lock().unwrap().pop_front() {
            Some(page) => page,
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

pub struct ScriptedLauncher {
    pub log: Arc<BrowserLog>,
}

impl ScriptedLauncher {
    /// Serves `pages` in order, then `fallback` forever.
    pub fn new(pages: &[&str], fallback: &str) -> Self {
        let log = BrowserLog {
            pages: Mutex::new(pages.iter().map(|p| p.to_string()).collect()),
            fallback: Mutex::new(fallback.to_string()),
            ..Default::default()
        };
        Self { log: Arc::new(log) }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            log: self.log.clone(),
            current_url: String::new(),
            current_html: String::new(),
        }))
    }
}

pub struct ScriptedSession {
    log: Arc<BrowserLog>,
    current_url: String,
    current_html: String,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        self.log.gotos.fetch_add(1, Ordering::SeqCst);
        self.current_url = url.to_string();
        self.current_html = self.log.next_page();
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        self.log.reloads.fetch_add(1, Ordering::SeqCst);
        self.current_html = self.log.next_page();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script == READY_STATE_SCRIPT {
            return Ok(json!("complete"));
        }
        if script.contains(VISIBLE_PROBE_MARKER) {
            if *self.log.element_visible.lock().unwrap() {
                return Ok(json!({"tag": "DIV", "id": "root", "class": "app", "text": "ready"}));
            }
            return Ok(Value::Null);
        }
        Ok(Value::Null)
    }

    async fn html(&self) -> Result<String> {
        Ok(self.current_html.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok("Scripted".to_string())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.current_url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Navigator over `launcher` that never sleeps.
pub fn instant_navigator(launcher: Arc<ScriptedLauncher>) -> Navigator {
    let settings = NavigationSettings {
        max_retries: 3,
        page_load_timeout: Duration::from_millis(50),
        element_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
    };
    Navigator::new(launcher, Arc::new(InstantPacer), settings)
}
