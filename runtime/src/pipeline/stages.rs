// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scraper, transformer and loader stage logic.

use super::runner::{Outbound, StageHandler};
use crate::extract::ExtractorRegistry;
use crate::model::{CanonicalRecord, RawContent, ScrapeRequest, Stage};
use crate::store::{RecordStore, UpsertOutcome};
use crate::strategy::StrategySelector;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const SCRAPER_SERVICE: &str = "SiteScraper";
pub const TRANSFORMER_SERVICE: &str = "SiteTransformer";
pub const LOADER_SERVICE: &str = "DataLoader";

/// `ScrapeRequest` → `RawContent` via ordered strategy fallback.
pub struct ScrapeStage {
    selector: Arc<StrategySelector>,
    output_topic: String,
}

impl ScrapeStage {
    pub fn new(selector: Arc<StrategySelector>, output_topic: &str) -> Self {
        Self {
            selector,
            output_topic: output_topic.to_string(),
        }
    }
}

#[async_trait]
impl StageHandler for ScrapeStage {
    type Input = ScrapeRequest;

    fn stage(&self) -> Stage {
        Stage::Scraper
    }

    fn service_name(&self) -> &str {
        SCRAPER_SERVICE
    }

    fn site_of(&self, input: &ScrapeRequest) -> String {
        input.site_name.clone()
    }

    async fn handle(&self, input: ScrapeRequest) -> Result<Vec<Outbound>> {
        let raw = self.selector.select_and_run(&input).await?;
        info!(
            site = %raw.site_name,
            strategy = %raw.strategy_used,
            bytes = raw.html.len(),
            "raw content scraped"
        );
        Ok(vec![Outbound {
            topic: self.output_topic.clone(),
            payload: serde_json::to_string(&raw)?,
        }])
    }
}

/// `RawContent` → zero or more `CanonicalRecord`s.
pub struct TransformStage {
    extractors: Arc<ExtractorRegistry>,
    output_topic: String,
}

impl TransformStage {
    pub fn new(extractors: Arc<ExtractorRegistry>, output_topic: &str) -> Self {
        Self {
            extractors,
            output_topic: output_topic.to_string(),
        }
    }
}

#[async_trait]
impl StageHandler for TransformStage {
    type Input = RawContent;

    fn stage(&self) -> Stage {
        Stage::Transformer
    }

    fn service_name(&self) -> &str {
        TRANSFORMER_SERVICE
    }

    fn site_of(&self, input: &RawContent) -> String {
        input.site_name.clone()
    }

    async fn handle(&self, input: RawContent) -> Result<Vec<Outbound>> {
        let records =
            self.extractors
                .extract(&input.strategy_used, &input.html, &input.site_name)?;
        debug!(site = %input.site_name, records = records.len(), "records extracted");
        records
            .iter()
            .map(|record| -> Result<Outbound> {
                Ok(Outbound {
                    topic: self.output_topic.clone(),
                    payload: serde_json::to_string(record)?,
                })
            })
            .collect()
    }
}

/// Upserts each `CanonicalRecord` into the store.
pub struct LoadStage {
    store: Arc<dyn RecordStore>,
}

impl LoadStage {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for LoadStage {
    type Input = CanonicalRecord;

    fn stage(&self) -> Stage {
        Stage::Loader
    }

    fn service_name(&self) -> &str {
        LOADER_SERVICE
    }

    fn site_of(&self, input: &CanonicalRecord) -> String {
        input.site_name.clone()
    }

    async fn handle(&self, input: CanonicalRecord) -> Result<Vec<Outbound>> {
        let outcome = self.store.upsert(&input)?;
        debug!(
            site = %input.site_name,
            description = %input.description,
            inserted = outcome == UpsertOutcome::Inserted,
            "record stored"
        );
        Ok(Vec::new())
    }
}
