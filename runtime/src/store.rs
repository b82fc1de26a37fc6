// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Idempotent product record store.
//!
//! `(site_name, description, price)` is the natural key: re-scraping an
//! unchanged listing updates the existing row instead of adding one.

use crate::model::CanonicalRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub trait RecordStore: Send + Sync {
    fn upsert(&self, record: &CanonicalRecord) -> Result<UpsertOutcome>;
    /// Records ordered by site then description, optionally for one site.
    fn list(&self, site: Option<&str>, limit: usize) -> Result<Vec<CanonicalRecord>>;
    fn count(&self) -> Result<u64>;
}

/// Record store backed by SQLite.
pub struct SqliteRecordStore {
    db: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open or create a store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open record store: {}", path.display()))?;
        Self::init(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS products (
                site_name TEXT NOT NULL,
                description TEXT NOT NULL,
                price TEXT NOT NULL,
                category TEXT NOT NULL,
                sub_category TEXT NOT NULL,
                serial_number TEXT NOT NULL,
                date_time TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (site_name, description, price)
            );",
        )
        .context("failed to create products table")?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))
    }
}

impl RecordStore for SqliteRecordStore {
    fn upsert(&self, record: &CanonicalRecord) -> Result<UpsertOutcome> {
        let db = self.conn()?;
        let existing: Option<i64> = db
            .query_row(
                "SELECT 1 FROM products WHERE site_name = ?1 AND description = ?2 AND price = ?3",
                params![record.site_name, record.description, record.price],
                |row| row.get(0),
            )
            .optional()?;

        db.execute(
            "INSERT INTO products
                (site_name, description, price, category, sub_category, serial_number, date_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (site_name, description, price) DO UPDATE SET
                category = excluded.category,
                sub_category = excluded.sub_category,
                serial_number = excluded.serial_number,
                date_time = excluded.date_time,
                updated_at = CURRENT_TIMESTAMP",
            params![
                record.site_name,
                record.description,
                record.price,
                record.category,
                record.sub_category,
                record.serial_number,
                record.date_time.to_rfc3339(),
            ],
        )
        .context("failed to upsert product record")?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn list(&self, site: Option<&str>, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT category, price, serial_number, site_name, description, sub_category, date_time
             FROM products
             WHERE ?1 IS NULL OR site_name = ?1
             ORDER BY site_name, description
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![site, limit as i64], |row| {
            Ok((
                CanonicalRecord {
                    category: row.get(0)?,
                    price: row.get(1)?,
                    serial_number: row.get(2)?,
                    site_name: row.get(3)?,
                    description: row.get(4)?,
                    sub_category: row.get(5)?,
                    date_time: Utc::now(),
                },
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, stamp) = row?;
            record.date_time = DateTime::parse_from_rfc3339(&stamp)
                .with_context(|| format!("bad timestamp in store: {stamp}"))?
                .with_timezone(&Utc);
            records.push(record);
        }
        Ok(records)
    }

    fn count(&self) -> Result<u64> {
        let db = self.conn()?;
        let n: i64 = db.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
