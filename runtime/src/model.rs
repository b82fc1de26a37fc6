// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Messages and records exchanged between pipeline stages.
//!
//! Wire names are PascalCase (`SiteName`, `Html`, ...). Required fields are
//! matched exactly; optional fields also accept the legacy spellings older
//! producers emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// One site to scrape, emitted by the scheduler on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScrapeRequest {
    pub site_name: String,
    pub site_address: String,
    /// Schedule period in seconds.
    #[serde(rename = "Period", default)]
    pub period_secs: u64,
}

impl ScrapeRequest {
    pub fn new(site_name: &str, site_address: &str, period: Duration) -> Self {
        Self {
            site_name: site_name.to_string(),
            site_address: site_address.to_string(),
            period_secs: period.as_secs(),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Which scraping method a [`StrategyConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    DirectHttp,
    StructuredQuery,
    BrowserDriven,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectHttp => "DirectHTTP",
            Self::StructuredQuery => "StructuredQuery",
            Self::BrowserDriven => "BrowserDriven",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-strategy parameters from the mapping file.
///
/// Fields are optional on the wire; a variant missing what it needs fails
/// with `InvalidConfig` when executed, not when the mapping is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum StrategyConfig {
    #[serde(rename = "DirectHTTP", alias = "DynamicHTML", rename_all = "PascalCase")]
    DirectHttp {
        #[serde(default, alias = "URL")]
        url: Option<String>,
        #[serde(default, alias = "ProductNodeQuery")]
        selector: Option<String>,
    },
    #[serde(rename = "StructuredQuery", alias = "GraphQL", rename_all = "PascalCase")]
    StructuredQuery {
        #[serde(default, alias = "URL")]
        url: Option<String>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        variables: Option<Value>,
        #[serde(default, alias = "operationName")]
        operation_name: Option<String>,
    },
    #[serde(rename = "BrowserDriven", alias = "HeadLessBrowser")]
    BrowserDriven,
}

impl StrategyConfig {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::DirectHttp { .. } => StrategyKind::DirectHttp,
            Self::StructuredQuery { .. } => StrategyKind::StructuredQuery,
            Self::BrowserDriven => StrategyKind::BrowserDriven,
        }
    }
}

/// Static per-site scraping recipe: strategies in the order to try them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScrapingMapping {
    pub site_name: String,
    #[serde(alias = "OrderedStrategies", default)]
    pub strategies: Vec<StrategyConfig>,
}

/// Content produced by one successful strategy execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawContent {
    #[serde(rename = "Site")]
    pub site_name: String,
    pub html: String,
    #[serde(default = "Utc::now", alias = "scrapeTime", alias = "DateTime")]
    pub scrape_time: DateTime<Utc>,
    #[serde(default, alias = "ScrapingMethod", alias = "strategyUsed")]
    pub strategy_used: String,
}

impl RawContent {
    pub fn new(site_name: &str, html: String, strategy: StrategyKind) -> Self {
        Self {
            site_name: site_name.to_string(),
            html,
            scrape_time: Utc::now(),
            strategy_used: strategy.as_str().to_string(),
        }
    }
}

/// Normalized, site-independent product row.
///
/// `(site_name, description, price)` is the natural deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanonicalRecord {
    pub category: String,
    pub price: String,
    pub serial_number: String,
    pub site_name: String,
    pub description: String,
    pub sub_category: String,
    pub date_time: DateTime<Utc>,
}

/// A message that failed processing, with enough context to inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeadLetter {
    pub original_message: String,
    pub service_name: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(original_message: &str, service_name: &str, error: &str) -> Self {
        Self {
            original_message: original_message.to_string(),
            service_name: service_name.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Scheduler,
    Scraper,
    Transformer,
    Loader,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduler => "Scheduler",
            Self::Scraper => "Scraper",
            Self::Transformer => "Transformer",
            Self::Loader => "Loader",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    Started,
    Success,
    Failed,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// Write-only stage transition telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStateEvent {
    pub site: String,
    pub stage: Stage,
    pub state: StageState,
    pub timestamp: DateTime<Utc>,
}

impl StageStateEvent {
    pub fn now(site: &str, stage: Stage, state: StageState) -> Self {
        Self {
            site: site.to_string(),
            stage,
            state,
            timestamp: Utc::now(),
        }
    }
}
