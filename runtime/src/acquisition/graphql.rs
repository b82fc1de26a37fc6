// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! GraphQL request documents and response envelopes.

use super::http_client::{HttpClient, HttpResponse};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A query document as posted to a GraphQL endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<&'a Value>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
}

/// Response envelope: `data` plus an optional `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

impl GraphqlEnvelope {
    /// Messages of all reported errors, empty when the query succeeded.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flatten()
            .map(|e| e.message.clone())
            .collect()
    }
}

/// Post a query document with browser-like headers. The JSON body sets
/// `Content-Type`.
pub async fn post_query(
    client: &HttpClient,
    url: &str,
    request: &GraphqlRequest<'_>,
) -> Result<HttpResponse> {
    let body = serde_json::to_value(request)?;
    client
        .post_json(url, &body, &[("Accept", "*/*")])
        .await
}
