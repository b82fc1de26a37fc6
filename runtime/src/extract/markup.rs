// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markup-based product extraction.

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::CanonicalRecord;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};

/// Selectors and fixed categories for one site's product listing markup.
#[derive(Debug, Clone)]
pub struct MarkupRecipe {
    pub container: String,
    pub name: String,
    pub price: String,
    /// Element and attribute holding a serial/sku, looked up inside the
    /// container (or on the container itself).
    pub serial: Option<(String, String)>,
    pub category: String,
    pub sub_category: String,
}

impl MarkupRecipe {
    /// Magento-style listing used by Payngo.
    pub fn payngo() -> Self {
        Self {
            container: "li.item.product.product-item".to_string(),
            name: "strong.product.name.product-item-name".to_string(),
            price: "span[id*='product-price'] span.price".to_string(),
            serial: Some((
                "[data-product-sku]".to_string(),
                "data-product-sku".to_string(),
            )),
            category: "Scooters-Bicycles".to_string(),
            sub_category: "Electric-Scooter".to_string(),
        }
    }

    /// One record per container with both a name and a price. Zero
    /// containers is a valid, empty result.
    pub fn extract(&self, html: &str, site: &str) -> ScrapeResult<Vec<CanonicalRecord>> {
        let container = parse(&self.container)?;
        let name = parse(&self.name)?;
        let price = parse(&self.price)?;
        let serial = match &self.serial {
            Some((sel, attr)) => Some((parse(sel)?, attr.as_str())),
            None => None,
        };

        let doc = Html::parse_document(html);
        let now = Utc::now();
        let mut records = Vec::new();

        for product in doc.select(&container) {
            let Some(description) = first_text(&product, &name) else {
                continue;
            };
            let Some(amount) = first_price(&product, &price) else {
                continue;
            };
            let serial_number = serial
                .as_ref()
                .and_then(|(sel, attr)| serial_of(&product, sel, attr))
                .unwrap_or_default();

            records.push(CanonicalRecord {
                category: self.category.clone(),
                price: amount,
                serial_number,
                site_name: site.to_string(),
                description,
                sub_category: self.sub_category.clone(),
                date_time: now,
            });
        }

        Ok(records)
    }
}

fn parse(selector: &str) -> ScrapeResult<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidConfig {
        strategy: "Markup",
        reason: format!("bad selector '{selector}': {e}"),
    })
}

/// Whitespace-collapsed text of the first match, if non-empty.
fn first_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = scope.select(selector).next()?;
    let text = el.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Price text of the first match. Non-breaking spaces are stripped before
/// any whitespace collapsing, which would otherwise turn them into spaces.
fn first_price(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = scope.select(selector).next()?;
    let cleaned = clean_price(&el.text().collect::<String>());
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn serial_of(product: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    product
        .value()
        .attr(attr)
        .or_else(|| {
            product
                .select(selector)
                .next()
                .and_then(|el| el.value().attr(attr))
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Strip non-breaking-space artifacts (entity or character) and trim.
pub fn clean_price(raw: &str) -> String {
    raw.replace("&nbsp;", "")
        .replace('\u{a0}', "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <ol class="products list items product-items">
          <li class="item product product-item" data-product-sku="SC-100">
            <strong class="product name product-item-name product_name">
              <a href="/x">Xiaomi Electric Scooter 4</a>
            </strong>
            <span id="product-price-100" class="price-wrapper"><span class="price">1,299&nbsp;₪</span></span>
          </li>
          <li class="item product product-item">
            <strong class="product name product-item-name product_name">Segway Ninebot E2</strong>
            <span id="product-price-200"><span class="price"> 899 </span></span>
          </li>
          <li class="item product product-item">
            <strong class="product name product-item-name product_name">No price here</strong>
          </li>
        </ol>"#;

    #[test]
    fn test_payngo_listing() {
        let records = MarkupRecipe::payngo().extract(LISTING, "Payngo").unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].description, "Xiaomi Electric Scooter 4");
        assert_eq!(records[0].price, "1,299₪");
        assert_eq!(records[0].serial_number, "SC-100");
        assert_eq!(records[0].category, "Scooters-Bicycles");
        assert_eq!(records[0].sub_category, "Electric-Scooter");
        assert_eq!(records[0].site_name, "Payngo");

        assert_eq!(records[1].price, "899");
        assert!(records[1].serial_number.is_empty());
    }

    #[test]
    fn test_zero_containers_is_empty() {
        let records = MarkupRecipe::payngo()
            .extract("<html><body><p>maintenance</p></body></html>", "Payngo")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_price_nbsp_between_amount_and_currency() {
        let html = "<li class=\"item product product-item\">\
            <strong class=\"product name product-item-name\">Segway  Ninebot\u{a0}E2</strong>\
            <span id=\"product-price-7\"><span class=\"price\">2,490\u{a0}₪</span></span></li>";
        let records = MarkupRecipe::payngo().extract(html, "Payngo").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, "2,490₪");
        assert_eq!(records[0].description, "Segway Ninebot E2");
    }

    #[test]
    fn test_clean_price() {
        assert_eq!(clean_price("  1,299&nbsp;"), "1,299");
        assert_eq!(clean_price("\u{a0}450.00\u{a0}"), "450.00");
    }
}
