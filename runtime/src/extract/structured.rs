// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Extraction from GraphQL product listings.

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::CanonicalRecord;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Number, Value};

/// Fixed categories for a site whose listing comes from a product query.
#[derive(Debug, Clone)]
pub struct QueryRecipe {
    pub category: String,
    pub sub_category: String,
}

impl QueryRecipe {
    pub fn alm() -> Self {
        Self {
            category: "Scooters-Bicycles".to_string(),
            sub_category: "Electric-Scooter".to_string(),
        }
    }

    /// Accepts the bare `data` object or the full `{data, errors}` envelope.
    pub fn extract(&self, payload: &str, site: &str) -> ScrapeResult<Vec<CanonicalRecord>> {
        let value: Value = serde_json::from_str(payload)?;
        let data = match value.get("data") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => value,
        };
        let listing: ListingData = serde_json::from_value(data).map_err(|e| {
            ScrapeError::Extraction(format!("unexpected product listing shape: {e}"))
        })?;

        let now = Utc::now();
        let records = listing
            .products
            .items
            .into_iter()
            .filter_map(|item| {
                let name = item.name?.trim().to_string();
                if name.is_empty() {
                    return None;
                }
                Some(CanonicalRecord {
                    category: self.category.clone(),
                    price: item.price_range.and_then(|p| p.amount()).unwrap_or_default(),
                    serial_number: item.sku.unwrap_or_default(),
                    site_name: site.to_string(),
                    description: name,
                    sub_category: self.sub_category.clone(),
                    date_time: now,
                })
            })
            .collect();
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ListingData {
    products: Products,
}

#[derive(Debug, Deserialize)]
struct Products {
    #[serde(default)]
    items: Vec<ProductItem>,
}

#[derive(Debug, Deserialize)]
struct ProductItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    price_range: Option<PriceRange>,
}

#[derive(Debug, Deserialize)]
struct PriceRange {
    #[serde(default)]
    minimum_price: Option<ProductPrice>,
}

#[derive(Debug, Deserialize)]
struct ProductPrice {
    #[serde(default)]
    final_price: Option<Money>,
    #[serde(default)]
    regular_price: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Money {
    #[serde(default)]
    value: Option<Number>,
}

impl PriceRange {
    fn amount(self) -> Option<String> {
        let price = self.minimum_price?;
        let money = price
            .final_price
            .and_then(|m| m.value)
            .or_else(|| price.regular_price.and_then(|m| m.value))?;
        Some(format_money(&money))
    }
}

/// Integers are minor units; fractional values are already major units.
/// Both render with two decimals.
pub fn format_money(value: &Number) -> String {
    if let Some(minor) = value.as_i64() {
        let sign = if minor < 0 { "-" } else { "" };
        let abs = minor.unsigned_abs();
        return format!("{sign}{}.{:02}", abs / 100, abs % 100);
    }
    if let Some(minor) = value.as_u64() {
        return format!("{}.{:02}", minor / 100, minor % 100);
    }
    format!("{:.2}", value.as_f64().unwrap_or_default())
}
