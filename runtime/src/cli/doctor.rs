// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::config::{self, PipelineConfig, SinkKind};
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;

/// Check Chromium, configuration files and data paths.
pub async fn run(config: &PipelineConfig) -> Result<()> {
    println!("Pricewatch Doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = config.navigation.chromium_path.clone().or_else(find_chromium);
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Set PRICEWATCH_CHROMIUM_PATH; the browser-driven strategy is disabled."
        ),
    }

    let mut ready = true;

    let mappings = config.mapping_file();
    match config::load_mappings(&mappings) {
        Ok(m) => println!("[OK] {} scraping mapping(s) in {}", m.len(), mappings.display()),
        Err(e) => {
            ready = false;
            println!("[!!] Mappings: {e:#}");
        }
    }

    let schedule = config.schedule_file();
    match config::load_schedule(&schedule) {
        Ok(s) => println!("[OK] {} schedule entr(ies) in {}", s.len(), schedule.display()),
        Err(e) => println!("[??] Schedule: {e:#} (only needed by `schedule`/`run-all`)"),
    }

    ready &= check_writable("Broker", &config.broker_path());
    ready &= check_writable("Store", &config.store_path());
    match config.telemetry.sink {
        SinkKind::Jsonl => {
            ready &= check_writable("Telemetry log", &config.telemetry_path());
        }
        SinkKind::Influx => match &config.telemetry.influx_url {
            Some(url) => println!("[OK] Telemetry: InfluxDB at {url}"),
            None => {
                ready = false;
                println!("[!!] Telemetry: influx sink selected but no influx_url set");
            }
        },
        SinkKind::Log => println!("[OK] Telemetry: log only"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

fn check_writable(label: &str, path: &Path) -> bool {
    let dir = path.parent().unwrap_or(path);
    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            println!("[OK] {label}: {}", path.display());
            true
        }
        Err(e) => {
            println!("[!!] {label}: cannot create {}: {e}", dir.display());
            false
        }
    }
}
