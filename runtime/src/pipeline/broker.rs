// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Topic-based message broker abstraction.
//!
//! Delivery is at-least-once: a polled message is handed out again to the
//! same consumer group until it is acknowledged.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Default upper bound on one payload (50 MiB); raw markup can be large.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 50 * 1024 * 1024;

/// One message handed to a consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Position in the topic log; strictly increasing per topic.
    pub id: i64,
    pub topic: String,
    pub group: String,
    pub payload: String,
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;

    /// The oldest message on `topic` not yet acknowledged by `group`.
    async fn poll(&self, topic: &str, group: &str) -> Result<Option<Delivery>>;

    /// Commit `delivery` and everything before it for its group.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Up to `limit` most recent payloads, newest first, without touching
    /// any group's offsets.
    async fn peek(&self, topic: &str, limit: usize) -> Result<Vec<String>>;

    /// Largest payload `publish` accepts, in bytes.
    fn max_message_bytes(&self) -> usize;
}

/// A payload rejected for its size. A property of the message, not of the
/// broker: publishing it again fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload for topic '{topic}' is {size} bytes, above the {max_bytes} byte limit")]
pub struct PayloadTooLarge {
    pub topic: String,
    pub size: usize,
    pub max_bytes: usize,
}

pub fn check_size(topic: &str, payload: &str, max_bytes: usize) -> Result<(), PayloadTooLarge> {
    if payload.len() > max_bytes {
        return Err(PayloadTooLarge {
            topic: topic.to_string(),
            size: payload.len(),
            max_bytes,
        });
    }
    Ok(())
}

/// Whether `err` is a size rejection, possibly under added context.
pub fn is_payload_too_large(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PayloadTooLarge>().is_some()
}
