// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Direct fetch: one GET, then one CSS-selected sub-tree.

use crate::acquisition::http_client::HttpClient;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{RawContent, ScrapeRequest, StrategyKind};
use scraper::{Html, Selector};
use tracing::debug;

const NAME: &str = "DirectHTTP";

pub async fn execute(
    http: &HttpClient,
    url: Option<&str>,
    selector: Option<&str>,
    request: &ScrapeRequest,
) -> ScrapeResult<RawContent> {
    let url = required(url, "Url")?;
    let selector = required(selector, "Selector")?;

    let resp = http
        .get(url)
        .await
        .map_err(|e| ScrapeError::Network(format!("{e:#}")))?;
    if !resp.is_success() {
        return Err(ScrapeError::Http {
            url: url.to_string(),
            status: resp.status,
        });
    }
    debug!(site = %request.site_name, url, bytes = resp.body.len(), "fetched page");

    let markup = select_subtree(&resp.body, selector)?;
    Ok(RawContent::new(
        &request.site_name,
        markup,
        StrategyKind::DirectHttp,
    ))
}

/// Outer markup of the first element matching `selector`.
///
/// Kept synchronous: `scraper::Html` is not `Send`.
pub fn select_subtree(html: &str, selector: &str) -> ScrapeResult<String> {
    let parsed = Selector::parse(selector).map_err(|e| ScrapeError::InvalidConfig {
        strategy: NAME,
        reason: format!("bad selector '{selector}': {e}"),
    })?;
    let doc = Html::parse_document(html);
    doc.select(&parsed)
        .next()
        .map(|el| el.html())
        .ok_or_else(|| ScrapeError::Extraction(format!("no element matches '{selector}'")))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> ScrapeResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ScrapeError::InvalidConfig {
            strategy: NAME,
            reason: format!("missing {field}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_match() {
        let html = r#"<html><body><ol class="products"><li>a</li></ol><ol class="products"><li>b</li></ol></body></html>"#;
        let out = select_subtree(html, "ol.products").unwrap();
        assert!(out.starts_with("<ol class=\"products\">"));
        assert!(out.contains("<li>a</li>"));
        assert!(!out.contains("<li>b</li>"));
    }

    #[test]
    fn test_select_no_match_is_extraction_error() {
        let err = select_subtree("<p>hi</p>", "div.grid").unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction(_)));
    }

    #[test]
    fn test_bad_selector_is_invalid_config() {
        let err = select_subtree("<p>hi</p>", "[[").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_missing_fields_fail_before_fetch() {
        let http = HttpClient::new(std::time::Duration::from_secs(1));
        let req = ScrapeRequest::new("Payngo", "https://www.payngo.co.il/", std::time::Duration::ZERO);
        let err = execute(&http, None, Some("ol"), &req).await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidConfig { .. }));
        let err = execute(&http, Some("http://127.0.0.1:9/"), Some("  "), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidConfig { .. }));
    }
}
