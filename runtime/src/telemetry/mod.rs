// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stage-state telemetry sinks.
//!
//! Every consumed message produces one `Started` and one terminal event
//! per stage. Sinks are write-only; a failed write is logged by the caller
//! and never fails the stage.

pub mod influx;
pub mod jsonl;

use crate::model::{StageState, StageStateEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

pub use influx::InfluxTelemetrySink;
pub use jsonl::JsonlTelemetrySink;

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: &StageStateEvent) -> Result<()>;
}

/// Writes events to the tracing log only.
pub struct LogTelemetrySink;

#[async_trait]
impl TelemetrySink for LogTelemetrySink {
    async fn record(&self, event: &StageStateEvent) -> Result<()> {
        info!(
            site = %event.site,
            stage = %event.stage,
            state = event.state.as_str(),
            "stage state"
        );
        Ok(())
    }
}

/// Keeps events in memory, for tests and `run-all` summaries.
#[derive(Default)]
pub struct MemoryTelemetrySink {
    events: Mutex<Vec<StageStateEvent>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StageStateEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// `(site, state)` pairs in recording order.
    pub fn states(&self) -> Vec<(String, StageState)> {
        self.events()
            .into_iter()
            .map(|e| (e.site, e.state))
            .collect()
    }
}

#[async_trait]
impl TelemetrySink for MemoryTelemetrySink {
    async fn record(&self, event: &StageStateEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("telemetry buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemoryTelemetrySink::new();
        sink.record(&StageStateEvent::now("ALM", Stage::Scraper, StageState::Started))
            .await
            .unwrap();
        sink.record(&StageStateEvent::now("ALM", Stage::Scraper, StageState::Success))
            .await
            .unwrap();
        assert_eq!(
            sink.states(),
            vec![
                ("ALM".to_string(), StageState::Started),
                ("ALM".to_string(), StageState::Success)
            ]
        );
    }
}
