// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pricewatch products`: list stored product records.

use crate::config::PipelineConfig;
use crate::store::{RecordStore, SqliteRecordStore};
use anyhow::Result;

pub fn run(config: &PipelineConfig, site: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let store = SqliteRecordStore::open(&config.store_path())?;
    let records = store.list(site, limit)?;

    if json {
        return super::print_json(&records);
    }

    if records.is_empty() {
        println!("No products stored.");
        return Ok(());
    }
    for r in &records {
        println!(
            "{:<24} {:>12}  {}  [{} / {}]",
            r.site_name, r.price, r.description, r.category, r.sub_category
        );
    }
    println!();
    println!("{} shown, {} stored", records.len(), store.count()?);
    Ok(())
}
