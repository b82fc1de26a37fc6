// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Builds pipeline components from a resolved [`PipelineConfig`].

use crate::acquisition::http_client::HttpClient;
use crate::config::{self, PipelineConfig, SinkKind};
use crate::navigation::pacer::HumanPacer;
use crate::navigation::Navigator;
use crate::pipeline::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::pipeline::{MessageBroker, RunnerSettings, SqliteBroker};
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::{BrowserLauncher, NoopLauncher};
use crate::strategy::{MappingRegistry, StrategySelector, StrategySet};
use crate::telemetry::influx::InfluxSettings;
use crate::telemetry::{
    InfluxTelemetrySink, JsonlTelemetrySink, LogTelemetrySink, TelemetrySink,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub fn open_broker(config: &PipelineConfig) -> Result<Arc<dyn MessageBroker>> {
    let broker = SqliteBroker::open(&config.broker_path())?
        .with_compression(config.broker.compress)
        .with_max_message_bytes(config.broker.max_message_bytes);
    Ok(Arc::new(broker))
}

pub fn open_telemetry(config: &PipelineConfig) -> Result<Arc<dyn TelemetrySink>> {
    let t = &config.telemetry;
    Ok(match t.sink {
        SinkKind::Log => Arc::new(LogTelemetrySink),
        SinkKind::Jsonl => Arc::new(JsonlTelemetrySink::open(&config.telemetry_path())?),
        SinkKind::Influx => {
            let settings = InfluxSettings {
                url: t
                    .influx_url
                    .clone()
                    .context("telemetry.influx_url is required for the influx sink")?,
                org: t
                    .influx_org
                    .clone()
                    .context("telemetry.influx_org is required for the influx sink")?,
                bucket: t
                    .influx_bucket
                    .clone()
                    .context("telemetry.influx_bucket is required for the influx sink")?,
                token: t.influx_token.clone(),
            };
            Arc::new(InfluxTelemetrySink::new(&settings)?)
        }
    })
}

/// Chromium-backed launcher, or a launcher that always fails when no
/// browser is installed (the other strategies keep working).
pub fn browser_launcher(config: &PipelineConfig) -> Arc<dyn BrowserLauncher> {
    match ChromiumLauncher::new(
        config.navigation.chromium_path.clone(),
        config.navigation.headless,
    ) {
        Ok(launcher) => {
            info!(path = %launcher.executable().display(), "using Chromium");
            Arc::new(launcher)
        }
        Err(e) => {
            warn!("{e:#}; browser-driven strategy disabled");
            Arc::new(NoopLauncher)
        }
    }
}

pub fn navigator(config: &PipelineConfig) -> Arc<Navigator> {
    Arc::new(Navigator::new(
        browser_launcher(config),
        Arc::new(HumanPacer),
        config.navigation_settings(),
    ))
}

pub fn selector(config: &PipelineConfig) -> Result<Arc<StrategySelector>> {
    let path = config.mapping_file();
    let mappings = config::load_mappings(&path)?;
    info!(sites = mappings.len(), path = %path.display(), "scraping mappings loaded");
    let registry = Arc::new(MappingRegistry::new(mappings));
    let strategies = StrategySet::new(HttpClient::new(config.http_timeout()), navigator(config));
    Ok(Arc::new(StrategySelector::new(registry, Arc::new(strategies))))
}

pub fn runner_settings(config: &PipelineConfig, input_topic: &str, group: &str) -> RunnerSettings {
    RunnerSettings {
        input_topic: input_topic.to_string(),
        group: group.to_string(),
        dead_letter_topic: config.topics.dead_letter.clone(),
        idle_poll: config.idle_poll(),
    }
}

/// Shutdown signal fired by Ctrl-C.
pub fn shutdown_on_ctrl_c() -> (Arc<ShutdownTrigger>, Shutdown) {
    let (trigger, shutdown) = shutdown::channel();
    let trigger = Arc::new(trigger);
    let signal = trigger.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal.trigger();
    });
    (trigger, shutdown)
}
