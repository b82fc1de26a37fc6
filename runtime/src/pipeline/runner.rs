// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-message consumption loop shared by every stage.
//!
//! Per message: `Started` → handler → publish downstream + `Success`, or
//! dead-letter + `Failed`. Exactly one terminal state is recorded, also for
//! malformed payloads and panicking handlers. The message is acknowledged
//! only after its terminal state, so a crash mid-message means redelivery.
//!
//! An outbound payload over the broker's size limit fails the message, not
//! the loop. Only broker I/O errors stop [`StageRunner::run`].

use super::broker::{check_size, is_payload_too_large, Delivery, MessageBroker};
use super::shutdown::Shutdown;
use crate::model::{DeadLetter, Stage, StageState, StageStateEvent};
use crate::telemetry::TelemetrySink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Site label used when a malformed payload names none.
pub const UNKNOWN_SITE: &str = "unknown";

/// A message a handler wants published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
}

/// Business logic of one stage.
#[async_trait]
pub trait StageHandler: Send + Sync {
    type Input: DeserializeOwned + Send;

    fn stage(&self) -> Stage;

    /// Name written into dead letters.
    fn service_name(&self) -> &str;

    fn site_of(&self, input: &Self::Input) -> String;

    /// Zero or more downstream messages, or the reason the message failed.
    async fn handle(&self, input: Self::Input) -> Result<Vec<Outbound>>;
}

/// Topics and pacing for one runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub input_topic: String,
    pub group: String,
    pub dead_letter_topic: String,
    /// Sleep between polls of an empty topic.
    pub idle_poll: Duration,
}

/// What happened to one consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { site: String, published: usize },
    DeadLettered { site: String, error: String },
}

pub struct StageRunner<H: StageHandler> {
    handler: H,
    broker: Arc<dyn MessageBroker>,
    telemetry: Arc<dyn TelemetrySink>,
    settings: RunnerSettings,
}

impl<H: StageHandler> StageRunner<H> {
    pub fn new(
        handler: H,
        broker: Arc<dyn MessageBroker>,
        telemetry: Arc<dyn TelemetrySink>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            handler,
            broker,
            telemetry,
            settings,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consume until shutdown. Returns early only on broker failures.
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<()> {
        let stage = self.handler.stage();
        info!(
            stage = %stage,
            topic = %self.settings.input_topic,
            group = %self.settings.group,
            "stage loop started"
        );

        while !shutdown.is_triggered() {
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.idle_poll) => {}
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(stage = %stage, "stage loop stopping: {e:#}");
                    return Err(e);
                }
            }
        }

        info!(stage = %stage, "stage loop stopped");
        Ok(())
    }

    /// Process one message if one is waiting.
    pub async fn process_next(&self) -> Result<Option<Outcome>> {
        let Some(delivery) = self
            .broker
            .poll(&self.settings.input_topic, &self.settings.group)
            .await
            .context("failed to poll input topic")?
        else {
            return Ok(None);
        };

        let outcome = self.process(&delivery).await?;
        self.broker
            .ack(&delivery)
            .await
            .context("failed to acknowledge message")?;
        Ok(Some(outcome))
    }

    async fn process(&self, delivery: &Delivery) -> Result<Outcome> {
        let stage = self.handler.stage();
        let parsed = serde_json::from_str::<H::Input>(&delivery.payload);
        let site = match &parsed {
            Ok(input) => self.handler.site_of(input),
            Err(_) => sniff_site(&delivery.payload),
        };

        self.record(&site, StageState::Started).await;
        debug!(stage = %stage, site = %site, id = delivery.id, "message received");

        let result = match parsed {
            Ok(input) => match AssertUnwindSafe(self.handler.handle(input))
                .catch_unwind()
                .await
            {
                Ok(result) => result.map_err(|e| format!("{e:#}")),
                Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
            },
            Err(e) => Err(format!("malformed message: {e}")),
        };

        let result = match result {
            Ok(outbound) => match self.publish_all(&outbound).await {
                Ok(()) => Ok(outbound.len()),
                Err(e) if is_payload_too_large(&e) => Err(format!("{e:#}")),
                Err(e) => {
                    self.record(&site, StageState::Failed).await;
                    return Err(e);
                }
            },
            Err(reason) => Err(reason),
        };

        match result {
            Ok(published) => {
                self.record(&site, StageState::Success).await;
                info!(stage = %stage, site = %site, published, "message processed");
                Ok(Outcome::Succeeded { site, published })
            }
            Err(reason) => {
                warn!(stage = %stage, site = %site, "message failed: {reason}");
                let letter =
                    DeadLetter::new(&delivery.payload, self.handler.service_name(), &reason);
                let published = match fit_dead_letter(letter, self.broker.max_message_bytes()) {
                    Ok(json) => self
                        .broker
                        .publish(&self.settings.dead_letter_topic, &json)
                        .await,
                    Err(e) => Err(e),
                };
                self.record(&site, StageState::Failed).await;
                published.context("failed to publish dead letter")?;
                Ok(Outcome::DeadLettered {
                    site,
                    error: reason,
                })
            }
        }
    }

    /// Publish every outbound message, or none if any is oversized.
    async fn publish_all(&self, outbound: &[Outbound]) -> Result<()> {
        let max_bytes = self.broker.max_message_bytes();
        for msg in outbound {
            check_size(&msg.topic, &msg.payload, max_bytes)?;
        }
        for msg in outbound {
            self.broker
                .publish(&msg.topic, &msg.payload)
                .await
                .with_context(|| format!("failed to publish to '{}'", msg.topic))?;
        }
        Ok(())
    }

    async fn record(&self, site: &str, state: StageState) {
        let event = StageStateEvent::now(site, self.handler.stage(), state);
        if let Err(e) = self.telemetry.record(&event).await {
            warn!(site, state = state.as_str(), "telemetry write failed: {e:#}");
        }
    }
}

/// Best-effort site name from an undecodable payload.
pub fn sniff_site(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| {
            ["SiteName", "Site", "siteName", "site"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|s| s.as_str()).map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_SITE.to_string())
}

/// Serialize `letter`, cutting the original message (then the error) until
/// the JSON fits in `max_bytes`.
pub fn fit_dead_letter(mut letter: DeadLetter, max_bytes: usize) -> Result<String> {
    let mut json = serde_json::to_string(&letter)?;
    while json.len() > max_bytes {
        let field = if !letter.original_message.is_empty() {
            &mut letter.original_message
        } else if !letter.error.is_empty() {
            &mut letter.error
        } else {
            anyhow::bail!("dead letter envelope alone exceeds the {max_bytes} byte limit");
        };
        let excess = json.len() - max_bytes;
        let keep = floor_char_boundary(field, field.len().saturating_sub(excess.max(field.len() / 8)));
        let cut = field.len() - keep;
        field.truncate(keep);
        debug!(cut, "truncated dead letter field");
        json = serde_json::to_string(&letter)?;
    }
    Ok(json)
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
