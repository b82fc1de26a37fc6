// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Durable broker on a shared SQLite file.
//!
//! Each topic is an append-only log in `messages`; each consumer group's
//! position is a row in `offsets`. Several stage processes can open the
//! same file.

use super::broker::{check_size, Delivery, MessageBroker, DEFAULT_MAX_MESSAGE_BYTES};
use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection, OptionalExtension};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub struct SqliteBroker {
    db: Mutex<Connection>,
    compress: bool,
    max_message_bytes: usize,
}

impl SqliteBroker {
    /// Open or create a broker database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open broker: {}", path.display()))?;
        Self::init(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.busy_timeout(Duration::from_secs(5))?;
        db.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic TEXT NOT NULL,
                payload BLOB NOT NULL,
                compressed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
             );
             CREATE INDEX IF NOT EXISTS idx_messages_topic ON messages (topic, id);
             CREATE TABLE IF NOT EXISTS offsets (
                group_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                last_id INTEGER NOT NULL,
                PRIMARY KEY (group_id, topic)
             );",
        )
        .context("failed to create broker tables")?;
        Ok(Self {
            db: Mutex::new(db),
            compress: true,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        })
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("broker connection lock poisoned"))
    }
}

#[async_trait]
impl MessageBroker for SqliteBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        check_size(topic, payload, self.max_message_bytes)?;
        let body = if self.compress {
            gzip(payload.as_bytes())?
        } else {
            payload.as_bytes().to_vec()
        };
        self.conn()?
            .execute(
                "INSERT INTO messages (topic, payload, compressed) VALUES (?1, ?2, ?3)",
                params![topic, body, self.compress],
            )
            .with_context(|| format!("failed to publish to '{topic}'"))?;
        Ok(())
    }

    async fn poll(&self, topic: &str, group: &str) -> Result<Option<Delivery>> {
        let db = self.conn()?;
        let row: Option<(i64, Vec<u8>, bool)> = db
            .query_row(
                "SELECT id, payload, compressed FROM messages
                 WHERE topic = ?1 AND id > COALESCE(
                    (SELECT last_id FROM offsets WHERE group_id = ?2 AND topic = ?1), 0)
                 ORDER BY id LIMIT 1",
                params![topic, group],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((id, body, compressed)) => Ok(Some(Delivery {
                id,
                topic: topic.to_string(),
                group: group.to_string(),
                payload: decode(body, compressed)?,
            })),
            None => Ok(None),
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO offsets (group_id, topic, last_id) VALUES (?1, ?2, ?3)
             ON CONFLICT (group_id, topic) DO UPDATE SET
                last_id = MAX(last_id, excluded.last_id)",
            params![delivery.group, delivery.topic, delivery.id],
        )?;
        Ok(())
    }

    fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    async fn peek(&self, topic: &str, limit: usize) -> Result<Vec<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT payload, compressed FROM messages WHERE topic = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![topic, limit as i64], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, bool>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (body, compressed) = row?;
            out.push(decode(body, compressed)?);
        }
        Ok(out)
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn decode(body: Vec<u8>, compressed: bool) -> Result<String> {
    let bytes = if compressed {
        let mut out = Vec::new();
        GzDecoder::new(body.as_slice())
            .read_to_end(&mut out)
            .context("failed to decompress payload")?;
        out
    } else {
        body
    };
    String::from_utf8(bytes).context("payload is not UTF-8")
}
