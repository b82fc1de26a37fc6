// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricewatch navigate <url>`: one stealth navigation and page snapshot.

use super::components;
use crate::config::PipelineConfig;
use crate::navigation::pacer::HumanPacer;
use crate::navigation::{Navigator, PageContent};
use anyhow::{bail, Result};
use std::sync::Arc;

pub async fn run(
    config: &PipelineConfig,
    url: &str,
    wait_for: Option<&str>,
    json: bool,
) -> Result<()> {
    let navigator = Navigator::new(
        components::browser_launcher(config),
        Arc::new(HumanPacer),
        config.navigation_settings(),
    );

    let mut guard = navigator.create_session().await?;
    let outcome: Result<PageContent> = async {
        if !navigator.navigate(&mut guard, url).await {
            bail!(
                "navigation to {url} failed after {} attempts",
                navigator.settings().max_retries
            );
        }
        if let Some(selector) = wait_for {
            navigator
                .wait_for_element(&guard, selector, navigator.settings().element_timeout)
                .await?;
        }
        Ok(navigator.extract_all(&guard).await?)
    }
    .await;
    guard.release().await;
    let page = outcome?;

    if json {
        return super::print_json(&page);
    }

    println!("Title:    {}", page.title);
    println!("URL:      {}", page.url);
    println!("Markup:   {} bytes", page.html.len());
    println!("Text:     {} chars", page.text.chars().count());
    println!("Links:    {}", page.links.len());
    println!("Images:   {}", page.images.len());
    println!("Forms:    {}", page.forms.len());
    println!("Scripts:  {}", page.scripts.len());
    if let Some(canonical) = page.metadata.get("canonical") {
        println!("Canonical: {canonical}");
    }
    let preview: String = page.text.chars().take(300).collect();
    if !preview.is_empty() {
        println!();
        println!("{preview}");
    }
    Ok(())
}
