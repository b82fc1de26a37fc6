// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricewatch dead-letters`: inspect recent failures without consuming
//! them.

use super::components;
use crate::config::PipelineConfig;
use crate::model::DeadLetter;
use anyhow::Result;

pub async fn run(config: &PipelineConfig, limit: usize, json: bool) -> Result<()> {
    let broker = components::open_broker(config)?;
    let payloads = broker.peek(&config.topics.dead_letter, limit).await?;
    let letters: Vec<DeadLetter> = payloads
        .iter()
        .filter_map(|p| serde_json::from_str(p).ok())
        .collect();

    if json {
        return super::print_json(&letters);
    }

    if letters.is_empty() {
        println!("No dead letters.");
        return Ok(());
    }
    for letter in &letters {
        let preview: String = letter.original_message.chars().take(120).collect();
        println!(
            "{}  {}  {}",
            letter.timestamp.format("%Y-%m-%d %H:%M:%S"),
            letter.service_name,
            letter.error
        );
        println!("    {preview}");
    }
    Ok(())
}
