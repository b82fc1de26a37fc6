// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! InfluxDB v2 sink: one line-protocol point per stage-state event.

use super::TelemetrySink;
use crate::model::StageStateEvent;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const MEASUREMENT: &str = "scraping_state";

#[derive(Debug, Clone)]
pub struct InfluxSettings {
    /// Base URL, e.g. `http://localhost:8086`.
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: Option<String>,
}

pub struct InfluxTelemetrySink {
    client: reqwest::Client,
    write_url: String,
    token: Option<String>,
}

impl InfluxTelemetrySink {
    pub fn new(settings: &InfluxSettings) -> Result<Self> {
        // Relative join keeps any path prefix on the base URL.
        let base = if settings.url.ends_with('/') {
            settings.url.clone()
        } else {
            format!("{}/", settings.url)
        };
        let mut write_url = url::Url::parse(&base)
            .with_context(|| format!("invalid InfluxDB url: {}", settings.url))?
            .join("api/v2/write")?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &settings.org)
            .append_pair("bucket", &settings.bucket)
            .append_pair("precision", "ms");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Ok(Self {
            client,
            write_url: write_url.to_string(),
            token: settings.token.clone(),
        })
    }
}

#[async_trait]
impl TelemetrySink for InfluxTelemetrySink {
    async fn record(&self, event: &StageStateEvent) -> Result<()> {
        let mut request = self
            .client
            .post(&self.write_url)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line_protocol(event));
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {token}"));
        }
        let resp = request.send().await.context("InfluxDB write failed")?;
        if !resp.status().is_success() {
            bail!("InfluxDB write returned HTTP {}", resp.status().as_u16());
        }
        Ok(())
    }
}

/// `scraping_state,site=<site>,stage=<stage> state="<state>" <ms>`
pub fn line_protocol(event: &StageStateEvent) -> String {
    format!(
        "{MEASUREMENT},site={},stage={} state=\"{}\" {}",
        escape_tag(&event.site),
        escape_tag(event.stage.as_str()),
        escape_field(event.state.as_str()),
        event.timestamp.timestamp_millis()
    )
}

fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_field(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
