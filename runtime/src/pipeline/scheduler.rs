// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Periodic scrape-request emitter.
//!
//! Every schedule entry is published once at start and then every
//! `Period` seconds. A zero period publishes once.

use super::broker::MessageBroker;
use super::shutdown::Shutdown;
use crate::model::{ScrapeRequest, Stage, StageState, StageStateEvent};
use crate::telemetry::TelemetrySink;
use anyhow::Result;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

struct Entry {
    request: ScrapeRequest,
    /// `None` once a one-shot entry has fired.
    next_due: Option<Instant>,
}

pub struct Scheduler {
    broker: Arc<dyn MessageBroker>,
    telemetry: Arc<dyn TelemetrySink>,
    topic: String,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        telemetry: Arc<dyn TelemetrySink>,
        topic: &str,
        schedule: Vec<ScrapeRequest>,
        start: Instant,
    ) -> Self {
        let entries = schedule
            .into_iter()
            .map(|request| Entry {
                request,
                next_due: Some(start),
            })
            .collect();
        Self {
            broker,
            telemetry,
            topic: topic.to_string(),
            entries,
        }
    }

    /// Publish every entry due at `now`. Returns how many were published.
    pub async fn emit_due(&mut self, now: Instant) -> usize {
        let mut emitted = 0;
        for i in 0..self.entries.len() {
            let due = matches!(self.entries[i].next_due, Some(at) if at <= now);
            if !due {
                continue;
            }
            let request = self.entries[i].request.clone();
            if self.emit(&request).await {
                emitted += 1;
            }
            let period = request.period();
            self.entries[i].next_due = if period.is_zero() {
                None
            } else {
                Some(now + period)
            };
        }
        emitted
    }

    /// Earliest pending deadline, if any entry will fire again.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|e| e.next_due).min()
    }

    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<()> {
        info!(entries = self.entries.len(), topic = %self.topic, "scheduler started");
        while !shutdown.is_triggered() {
            self.emit_due(Instant::now()).await;
            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = shutdown.wait() => break,
                    }
                }
                None => {
                    info!("no recurring entries left, waiting for shutdown");
                    shutdown.wait().await;
                    break;
                }
            }
        }
        info!("scheduler stopped");
        Ok(())
    }

    async fn emit(&self, request: &ScrapeRequest) -> bool {
        let site = request.site_name.as_str();
        self.record(site, StageState::Started).await;
        let published = match serde_json::to_string(request) {
            Ok(json) => self.broker.publish(&self.topic, &json).await,
            Err(e) => Err(e.into()),
        };
        match published {
            Ok(()) => {
                info!(site, "scrape request published");
                self.record(site, StageState::Success).await;
                true
            }
            Err(e) => {
                error!(site, "failed to publish scrape request: {e:#}");
                self.record(site, StageState::Failed).await;
                false
            }
        }
    }

    async fn record(&self, site: &str, state: StageState) {
        let event = StageStateEvent::now(site, Stage::Scheduler, state);
        if let Err(e) = self.telemetry.record(&event).await {
            warn!(site, "telemetry write failed: {e:#}");
        }
    }
}
