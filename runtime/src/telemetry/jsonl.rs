// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSONL stage-state log.
//!
//! - One JSON object per line, append-only
//! - Rotates when the file exceeds the size limit (default 100 MB)
//! - Rotated files named `.1`, `.2`, etc. (max 5 rotations)

use super::TelemetrySink;
use crate::model::StageStateEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default log size before rotation (100 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

struct LogFile {
    file: File,
    /// Approximate current size (may drift slightly; re-checked on open).
    current_size: u64,
}

pub struct JsonlTelemetrySink {
    path: PathBuf,
    max_size: u64,
    inner: Mutex<LogFile>,
}

impl JsonlTelemetrySink {
    /// Open or create the log file.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_max_size(path, DEFAULT_MAX_LOG_SIZE)
    }

    pub fn with_max_size(path: &Path, max_size: u64) -> Result<Self> {
        let file = open_append(path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            max_size,
            inner: Mutex::new(LogFile { file, current_size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &StageStateEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let mut log = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("telemetry log lock poisoned"))?;

        if log.current_size >= self.max_size {
            self.rotate(&mut log)?;
        }

        writeln!(log.file, "{json}").context("failed to write telemetry event")?;
        log.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Rotate: `.4` → `.5`, ..., current → `.1`. The oldest is dropped.
    fn rotate(&self, log: &mut LogFile) -> Result<()> {
        log.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        log.file = open_append(&self.path).context("failed to reopen telemetry log after rotation")?;
        log.current_size = 0;
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for JsonlTelemetrySink {
    async fn record(&self, event: &StageStateEvent) -> Result<()> {
        self.append(event)
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open telemetry log: {}", path.display()))
}

/// `state.jsonl.1`, `state.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("stage-state.jsonl")
    );
    base.with_file_name(name)
}
