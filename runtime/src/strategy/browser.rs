// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser-driven strategy: stealth navigation to the site address, then a
//! full page snapshot.

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{RawContent, ScrapeRequest, StrategyKind};
use crate::navigation::Navigator;
use tracing::info;
use url::Url;

pub async fn execute(navigator: &Navigator, request: &ScrapeRequest) -> ScrapeResult<RawContent> {
    let address = Url::parse(&request.site_address).map_err(|e| ScrapeError::InvalidConfig {
        strategy: "BrowserDriven",
        reason: format!("bad site address '{}': {e}", request.site_address),
    })?;

    let mut guard = navigator.create_session().await?;
    let outcome = async {
        if !navigator.navigate(&mut guard, address.as_str()).await {
            return Err(ScrapeError::NavigationFailed {
                url: address.to_string(),
                attempts: navigator.settings().max_retries,
            });
        }
        navigator.extract_all(&guard).await
    }
    .await;
    guard.release().await;

    let page = outcome?;
    info!(
        site = %request.site_name,
        url = %page.url,
        bytes = page.html.len(),
        "browser snapshot captured"
    );
    Ok(RawContent::new(
        &request.site_name,
        page.html,
        StrategyKind::BrowserDriven,
    ))
}
