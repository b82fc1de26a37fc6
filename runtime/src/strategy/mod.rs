// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scraping strategies and the ordered-fallback selector.
//!
//! Each [`StrategyConfig`] variant maps to one executor. [`StrategySet`]
//! dispatches on the variant with a plain `match`; the selector only sees
//! the [`StrategyExecutor`] trait so tests can count invocations.

pub mod browser;
pub mod direct_http;
pub mod selector;
pub mod structured_query;

use crate::acquisition::http_client::HttpClient;
use crate::error::ScrapeResult;
use crate::model::{RawContent, ScrapeRequest, StrategyConfig};
use crate::navigation::Navigator;
use async_trait::async_trait;
use std::sync::Arc;

pub use selector::{MappingRegistry, StrategySelector};

/// Executes one configured strategy for one site.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    async fn execute(
        &self,
        config: &StrategyConfig,
        request: &ScrapeRequest,
    ) -> ScrapeResult<RawContent>;
}

/// The production strategy set.
pub struct StrategySet {
    http: HttpClient,
    navigator: Arc<Navigator>,
}

impl StrategySet {
    pub fn new(http: HttpClient, navigator: Arc<Navigator>) -> Self {
        Self { http, navigator }
    }
}

#[async_trait]
impl StrategyExecutor for StrategySet {
    async fn execute(
        &self,
        config: &StrategyConfig,
        request: &ScrapeRequest,
    ) -> ScrapeResult<RawContent> {
        match config {
            StrategyConfig::DirectHttp { url, selector } => {
                direct_http::execute(&self.http, url.as_deref(), selector.as_deref(), request)
                    .await
            }
            StrategyConfig::StructuredQuery {
                url,
                query,
                variables,
                operation_name,
            } => {
                let params = structured_query::QueryParams {
                    url: url.as_deref(),
                    query: query.as_deref(),
                    variables: variables.as_ref(),
                    operation_name: operation_name.as_deref(),
                };
                structured_query::execute(&self.http, &params, request).await
            }
            StrategyConfig::BrowserDriven => browser::execute(&self.navigator, request).await,
        }
    }
}
