// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ordered-fallback strategy selection.

use super::StrategyExecutor;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{RawContent, ScrapeRequest, ScrapingMapping};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only lookup of scraping mappings by site name.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    by_site: HashMap<String, ScrapingMapping>,
}

impl MappingRegistry {
    /// Later entries for the same site replace earlier ones.
    pub fn new(mappings: Vec<ScrapingMapping>) -> Self {
        let by_site = mappings
            .into_iter()
            .map(|m| (m.site_name.clone(), m))
            .collect();
        Self { by_site }
    }

    pub fn get(&self, site: &str) -> Option<&ScrapingMapping> {
        self.by_site.get(site)
    }

    pub fn len(&self) -> usize {
        self.by_site.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_site.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.by_site.keys().map(String::as_str)
    }
}

/// Tries a site's strategies in order and returns the first success.
pub struct StrategySelector {
    registry: Arc<MappingRegistry>,
    executor: Arc<dyn StrategyExecutor>,
}

impl StrategySelector {
    pub fn new(registry: Arc<MappingRegistry>, executor: Arc<dyn StrategyExecutor>) -> Self {
        Self { registry, executor }
    }

    /// Run the site's strategies in configured order, stopping at the first
    /// success. Individual failures are logged; only exhaustion is an error.
    pub async fn select_and_run(&self, request: &ScrapeRequest) -> ScrapeResult<RawContent> {
        let site = request.site_name.as_str();
        let mapping = match self.registry.get(site) {
            Some(m) if !m.strategies.is_empty() => m,
            _ => return Err(ScrapeError::NoMappingFound(site.to_string())),
        };

        let mut failures = Vec::with_capacity(mapping.strategies.len());
        for (index, config) in mapping.strategies.iter().enumerate() {
            let kind = config.kind();
            info!(site, strategy = %kind, position = index + 1, "trying strategy");
            match self.executor.execute(config, request).await {
                Ok(content) => {
                    info!(site, strategy = %kind, "strategy succeeded");
                    return Ok(content);
                }
                Err(e) => {
                    warn!(site, strategy = %kind, "strategy failed: {e}");
                    failures.push(format!("{kind}: {e}"));
                }
            }
        }

        Err(ScrapeError::AllStrategiesFailed {
            site: site.to_string(),
            failures,
        })
    }
}
