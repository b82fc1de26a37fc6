// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Long-running stage commands: `scrape`, `transform`, `load`, `schedule`
//! and `run-all`.

use super::components;
use crate::config::{self, PipelineConfig};
use crate::extract::ExtractorRegistry;
use crate::pipeline::shutdown::Shutdown;
use crate::pipeline::{
    LoadStage, MessageBroker, Scheduler, ScrapeStage, StageRunner, TransformStage,
};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::telemetry::TelemetrySink;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::info;

struct Shared {
    broker: Arc<dyn MessageBroker>,
    telemetry: Arc<dyn TelemetrySink>,
}

fn shared(config: &PipelineConfig) -> Result<Shared> {
    Ok(Shared {
        broker: components::open_broker(config)?,
        telemetry: components::open_telemetry(config)?,
    })
}

fn scrape_runner(config: &PipelineConfig, shared: &Shared) -> Result<StageRunner<ScrapeStage>> {
    let stage = ScrapeStage::new(components::selector(config)?, &config.topics.raw_content);
    Ok(StageRunner::new(
        stage,
        shared.broker.clone(),
        shared.telemetry.clone(),
        components::runner_settings(config, &config.topics.requests, &config.groups.scraper),
    ))
}

fn transform_runner(config: &PipelineConfig, shared: &Shared) -> StageRunner<TransformStage> {
    let stage = TransformStage::new(
        Arc::new(ExtractorRegistry::builtin()),
        &config.topics.records,
    );
    StageRunner::new(
        stage,
        shared.broker.clone(),
        shared.telemetry.clone(),
        components::runner_settings(
            config,
            &config.topics.raw_content,
            &config.groups.transformer,
        ),
    )
}

fn load_runner(config: &PipelineConfig, shared: &Shared) -> Result<StageRunner<LoadStage>> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open(&config.store_path())?);
    Ok(StageRunner::new(
        LoadStage::new(store),
        shared.broker.clone(),
        shared.telemetry.clone(),
        components::runner_settings(config, &config.topics.records, &config.groups.loader),
    ))
}

fn scheduler(config: &PipelineConfig, shared: &Shared) -> Result<Scheduler> {
    let path = config.schedule_file();
    let schedule = config::load_schedule(&path)?;
    info!(entries = schedule.len(), path = %path.display(), "schedule loaded");
    Ok(Scheduler::new(
        shared.broker.clone(),
        shared.telemetry.clone(),
        &config.topics.requests,
        schedule,
        tokio::time::Instant::now(),
    ))
}

pub async fn run_scrape(config: &PipelineConfig) -> Result<()> {
    let shared = shared(config)?;
    let runner = scrape_runner(config, &shared)?;
    let (_trigger, shutdown) = components::shutdown_on_ctrl_c();
    runner.run(shutdown).await
}

pub async fn run_transform(config: &PipelineConfig) -> Result<()> {
    let shared = shared(config)?;
    let runner = transform_runner(config, &shared);
    let (_trigger, shutdown) = components::shutdown_on_ctrl_c();
    runner.run(shutdown).await
}

pub async fn run_load(config: &PipelineConfig) -> Result<()> {
    let shared = shared(config)?;
    let runner = load_runner(config, &shared)?;
    let (_trigger, shutdown) = components::shutdown_on_ctrl_c();
    runner.run(shutdown).await
}

pub async fn run_schedule(config: &PipelineConfig) -> Result<()> {
    let shared = shared(config)?;
    let mut scheduler = scheduler(config, &shared)?;
    let (_trigger, shutdown) = components::shutdown_on_ctrl_c();
    scheduler.run(shutdown).await
}

/// All four stages in one process over one broker. The first loop to fail
/// stops the others.
pub async fn run_all(config: &PipelineConfig) -> Result<()> {
    let shared = shared(config)?;
    let scrape = scrape_runner(config, &shared)?;
    let transform = transform_runner(config, &shared);
    let load = load_runner(config, &shared)?;
    let mut scheduler = scheduler(config, &shared)?;
    let (trigger, shutdown) = components::shutdown_on_ctrl_c();

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    let s = shutdown.clone();
    tasks.spawn(async move { scheduler.run(s).await });
    let s = shutdown.clone();
    tasks.spawn(async move { scrape.run(s).await });
    let s = shutdown.clone();
    tasks.spawn(async move { transform.run(s).await });
    let s: Shutdown = shutdown;
    tasks.spawn(async move { load.run(s).await });

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.context("stage task panicked").and_then(|r| r);
        if let Err(e) = result {
            trigger.trigger();
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
