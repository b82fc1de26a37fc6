// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process broker.

use super::broker::{check_size, Delivery, MessageBroker, DEFAULT_MAX_MESSAGE_BYTES};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<String>>,
    /// (group, topic) → last acknowledged id.
    offsets: HashMap<(String, String), i64>,
}

/// Topic logs and offsets held in memory. Ids are 1-based log positions.
pub struct MemoryBroker {
    state: Mutex<State>,
    max_message_bytes: usize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    /// Every payload ever published to `topic`, oldest first.
    pub fn messages(&self, topic: &str) -> Vec<String> {
        self.lock()
            .map(|s| s.topics.get(topic).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("broker state poisoned"))
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        check_size(topic, payload, self.max_message_bytes)?;
        self.lock()?
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(())
    }

    async fn poll(&self, topic: &str, group: &str) -> Result<Option<Delivery>> {
        let state = self.lock()?;
        let committed = state
            .offsets
            .get(&(group.to_string(), topic.to_string()))
            .copied()
            .unwrap_or(0);
        let next = state
            .topics
            .get(topic)
            .and_then(|log| log.get(committed as usize))
            .map(|payload| Delivery {
                id: committed + 1,
                topic: topic.to_string(),
                group: group.to_string(),
                payload: payload.clone(),
            });
        Ok(next)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut state = self.lock()?;
        let offset = state
            .offsets
            .entry((delivery.group.clone(), delivery.topic.clone()))
            .or_insert(0);
        *offset = (*offset).max(delivery.id);
        Ok(())
    }

    fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    async fn peek(&self, topic: &str, limit: usize) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .topics
            .get(topic)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redelivers_until_acked() {
        let broker = MemoryBroker::new();
        broker.publish("t", "a").await.unwrap();
        broker.publish("t", "b").await.unwrap();

        let first = broker.poll("t", "g").await.unwrap().unwrap();
        assert_eq!(first.payload, "a");
        let again = broker.poll("t", "g").await.unwrap().unwrap();
        assert_eq!(again, first);

        broker.ack(&first).await.unwrap();
        let second = broker.poll("t", "g").await.unwrap().unwrap();
        assert_eq!(second.payload, "b");

        // Groups are independent.
        assert_eq!(broker.poll("t", "other").await.unwrap().unwrap().payload, "a");

        broker.ack(&second).await.unwrap();
        assert!(broker.poll("t", "g").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_oversized_payload() {
        let broker = MemoryBroker::new().with_max_message_bytes(4);
        assert!(broker.publish("t", "12345").await.is_err());
        assert!(broker.peek("t", 10).await.unwrap().is_empty());
    }
}
