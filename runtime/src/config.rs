// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! `PRICEWATCH_*` environment variables, CLI flags. The resolved struct is
//! passed to constructors; nothing reads configuration globally.

use crate::model::{ScrapeRequest, ScrapingMapping};
use crate::navigation::NavigationSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base directory for every path not set explicitly.
    pub data_dir: PathBuf,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub groups: GroupConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
    pub navigation: NavigationConfig,
    pub http: HttpConfig,
    pub mapping_path: Option<PathBuf>,
    pub schedule_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub path: Option<PathBuf>,
    pub idle_poll_ms: u64,
    pub max_message_bytes: usize,
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub requests: String,
    pub raw_content: String,
    pub records: String,
    pub dead_letter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub scraper: String,
    pub transformer: String,
    pub loader: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Tracing log only.
    Log,
    Jsonl,
    Influx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub sink: SinkKind,
    pub jsonl_path: Option<PathBuf>,
    pub influx_url: Option<String>,
    pub influx_org: Option<String>,
    pub influx_bucket: Option<String>,
    pub influx_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub max_retries: u32,
    pub page_load_timeout_ms: u64,
    pub element_timeout_ms: u64,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            broker: BrokerConfig::default(),
            topics: TopicConfig::default(),
            groups: GroupConfig::default(),
            store: StoreConfig::default(),
            telemetry: TelemetryConfig::default(),
            navigation: NavigationConfig::default(),
            http: HttpConfig::default(),
            mapping_path: None,
            schedule_path: None,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            path: None,
            idle_poll_ms: 500,
            max_message_bytes: crate::pipeline::broker::DEFAULT_MAX_MESSAGE_BYTES,
            compress: true,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            requests: "scraping-requests".to_string(),
            raw_content: "scraping-data".to_string(),
            records: "product-scraping-data".to_string(),
            dead_letter: "dead-letter-topic".to_string(),
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            scraper: "site-scraper".to_string(),
            transformer: "site-transformer".to_string(),
            loader: "data-loader".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Jsonl,
            jsonl_path: None,
            influx_url: None,
            influx_org: None,
            influx_bucket: None,
            influx_token: None,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            page_load_timeout_ms: 30_000,
            element_timeout_ms: 30_000,
            headless: true,
            chromium_path: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// `~/.pricewatch`, or a temp directory when there is no home.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".pricewatch")
}

impl PipelineConfig {
    /// Defaults overlaid with `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `PRICEWATCH_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let string = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = string("PRICEWATCH_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = string("PRICEWATCH_BROKER_PATH") {
            self.broker.path = Some(PathBuf::from(v));
        }
        self.broker.idle_poll_ms = read_u64(&string, "PRICEWATCH_IDLE_POLL_MS", self.broker.idle_poll_ms);
        if let Some(v) = string("PRICEWATCH_STORE_PATH") {
            self.store.path = Some(PathBuf::from(v));
        }
        if let Some(v) = string("PRICEWATCH_MAPPING_PATH") {
            self.mapping_path = Some(PathBuf::from(v));
        }
        if let Some(v) = string("PRICEWATCH_SCHEDULE_PATH") {
            self.schedule_path = Some(PathBuf::from(v));
        }

        if let Some(v) = string("PRICEWATCH_TELEMETRY_SINK") {
            match v.to_ascii_lowercase().as_str() {
                "log" => self.telemetry.sink = SinkKind::Log,
                "jsonl" => self.telemetry.sink = SinkKind::Jsonl,
                "influx" => self.telemetry.sink = SinkKind::Influx,
                _ => {}
            }
        }
        if let Some(v) = string("PRICEWATCH_TELEMETRY_PATH") {
            self.telemetry.jsonl_path = Some(PathBuf::from(v));
        }
        if let Some(v) = string("PRICEWATCH_INFLUX_URL") {
            self.telemetry.influx_url = Some(v);
        }
        if let Some(v) = string("PRICEWATCH_INFLUX_ORG") {
            self.telemetry.influx_org = Some(v);
        }
        if let Some(v) = string("PRICEWATCH_INFLUX_BUCKET") {
            self.telemetry.influx_bucket = Some(v);
        }
        if let Some(v) = string("PRICEWATCH_INFLUX_TOKEN") {
            self.telemetry.influx_token = Some(v);
        }

        self.navigation.max_retries =
            read_u64(&string, "PRICEWATCH_MAX_RETRIES", self.navigation.max_retries as u64) as u32;
        self.navigation.page_load_timeout_ms = read_u64(
            &string,
            "PRICEWATCH_PAGE_LOAD_TIMEOUT_MS",
            self.navigation.page_load_timeout_ms,
        );
        if let Some(v) = string("PRICEWATCH_HEADLESS") {
            self.navigation.headless = !matches!(v.as_str(), "0" | "false" | "no");
        }
        if let Some(v) = string("PRICEWATCH_CHROMIUM_PATH") {
            self.navigation.chromium_path = Some(PathBuf::from(v));
        }
        self.http.timeout_ms = read_u64(&string, "PRICEWATCH_HTTP_TIMEOUT_MS", self.http.timeout_ms);
    }

    pub fn broker_path(&self) -> PathBuf {
        self.broker
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("broker.db"))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("products.db"))
    }

    pub fn telemetry_path(&self) -> PathBuf {
        self.telemetry
            .jsonl_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("stage-state.jsonl"))
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.mapping_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("mappings.json"))
    }

    pub fn schedule_file(&self) -> PathBuf {
        self.schedule_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("schedule.json"))
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.broker.idle_poll_ms.max(10))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }

    pub fn navigation_settings(&self) -> NavigationSettings {
        NavigationSettings {
            max_retries: self.navigation.max_retries.max(1),
            page_load_timeout: Duration::from_millis(self.navigation.page_load_timeout_ms),
            element_timeout: Duration::from_millis(self.navigation.element_timeout_ms),
            ..NavigationSettings::default()
        }
    }
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default_value: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
}

/// Load the scraping mappings file: a JSON array of `{SiteName, Strategies}`.
pub fn load_mappings(path: &Path) -> Result<Vec<ScrapingMapping>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mappings: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid mappings file: {}", path.display()))
}

/// Load the schedule file: a JSON array of `{SiteName, SiteAddress, Period}`.
pub fn load_schedule(path: &Path) -> Result<Vec<ScrapeRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schedule: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid schedule file: {}", path.display()))
}
