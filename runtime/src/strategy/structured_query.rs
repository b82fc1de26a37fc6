// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured query: POST a GraphQL document, keep the `data` payload.

use crate::acquisition::graphql::{self, GraphqlEnvelope, GraphqlRequest};
use crate::acquisition::http_client::HttpClient;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{RawContent, ScrapeRequest, StrategyKind};
use serde_json::Value;
use tracing::debug;

const NAME: &str = "StructuredQuery";

/// Borrowed view of a `StructuredQuery` strategy configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueryParams<'a> {
    pub url: Option<&'a str>,
    pub query: Option<&'a str>,
    pub variables: Option<&'a Value>,
    pub operation_name: Option<&'a str>,
}

pub async fn execute(
    http: &HttpClient,
    params: &QueryParams<'_>,
    request: &ScrapeRequest,
) -> ScrapeResult<RawContent> {
    let url = required(params.url, "Url")?;
    let query = required(params.query, "Query")?;

    let doc = GraphqlRequest {
        query,
        variables: params.variables,
        operation_name: params.operation_name,
    };
    let resp = graphql::post_query(http, url, &doc)
        .await
        .map_err(|e| ScrapeError::Network(format!("{e:#}")))?;
    if !resp.is_success() {
        return Err(ScrapeError::Http {
            url: url.to_string(),
            status: resp.status,
        });
    }

    let data = parse_envelope(&resp.body)?;
    debug!(site = %request.site_name, url, "structured query succeeded");
    Ok(RawContent::new(
        &request.site_name,
        serde_json::to_string(&data)?,
        StrategyKind::StructuredQuery,
    ))
}

/// The envelope's `data`, or an extraction error carrying the joined
/// `errors` messages.
pub fn parse_envelope(body: &str) -> ScrapeResult<Value> {
    let envelope: GraphqlEnvelope = serde_json::from_str(body)?;
    let errors = envelope.error_messages();
    if !errors.is_empty() {
        return Err(ScrapeError::Extraction(format!(
            "GraphQL errors: {}",
            errors.join(", ")
        )));
    }
    match envelope.data {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(ScrapeError::Extraction(
            "GraphQL response has no data".to_string(),
        )),
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> ScrapeResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ScrapeError::InvalidConfig {
            strategy: NAME,
            reason: format!("missing {field}"),
        }),
    }
}
