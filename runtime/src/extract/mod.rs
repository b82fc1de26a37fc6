// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-site normalization of raw content into canonical records.
//!
//! Extractors are a closed set of recipe kinds selected by exact site name.
//! Sites without a registered recipe fall through to [`Extractor::Default`],
//! which keeps the payload verbatim so nothing is silently dropped.

pub mod markup;
pub mod structured;

use crate::error::ScrapeResult;
use crate::model::CanonicalRecord;
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

pub use markup::MarkupRecipe;
pub use structured::QueryRecipe;

pub const UNKNOWN_CATEGORY: &str = "Unknown";

static DEFAULT_EXTRACTOR: Extractor = Extractor::Default;

#[derive(Debug, Clone)]
pub enum Extractor {
    /// Product containers located by CSS selectors.
    Markup(MarkupRecipe),
    /// Items array of a GraphQL product listing.
    StructuredQuery(QueryRecipe),
    /// One verbatim record with placeholder categories.
    Default,
}

impl Extractor {
    /// Normalize `payload`, produced by strategy `method`, for `site`.
    pub fn extract(
        &self,
        method: &str,
        payload: &str,
        site: &str,
    ) -> ScrapeResult<Vec<CanonicalRecord>> {
        debug!(site, method, extractor = self.name(), "extracting");
        match self {
            Self::Markup(recipe) => recipe.extract(payload, site),
            Self::StructuredQuery(recipe) => recipe.extract(payload, site),
            Self::Default => Ok(vec![default_record(payload, site)]),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Markup(_) => "Markup",
            Self::StructuredQuery(_) => "StructuredQuery",
            Self::Default => "Default",
        }
    }
}

fn default_record(payload: &str, site: &str) -> CanonicalRecord {
    CanonicalRecord {
        category: UNKNOWN_CATEGORY.to_string(),
        price: String::new(),
        serial_number: String::new(),
        site_name: site.to_string(),
        description: payload.to_string(),
        sub_category: UNKNOWN_CATEGORY.to_string(),
        date_time: Utc::now(),
    }
}

/// Static site-name → extractor table.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    by_site: HashMap<String, Extractor>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Recipes for the sites the pipeline ships with.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let payngo = Extractor::Markup(MarkupRecipe::payngo());
        let alm = Extractor::StructuredQuery(QueryRecipe::alm());
        registry.register("Payngo", payngo.clone());
        registry.register("Payngo-Electric Scooter", payngo);
        registry.register("ALM", alm.clone());
        registry.register("ALM-Electric Scooter", alm);
        registry
    }

    pub fn register(&mut self, site: &str, extractor: Extractor) {
        self.by_site.insert(site.to_string(), extractor);
    }

    /// Exact-match lookup; unmatched sites get the default extractor.
    pub fn for_site(&self, site: &str) -> &Extractor {
        self.by_site.get(site).unwrap_or(&DEFAULT_EXTRACTOR)
    }

    pub fn extract(
        &self,
        method: &str,
        payload: &str,
        site: &str,
    ) -> ScrapeResult<Vec<CanonicalRecord>> {
        self.for_site(site).extract(method, payload, site)
    }
}
