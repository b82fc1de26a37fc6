// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Handles redirects, timeouts, retry on 5xx and transport errors, and
//! `retry-after` backoff on 429. Non-2xx statuses that survive the retries
//! are returned to the caller, which decides whether they are failures.

use crate::renderer::STEALTH_USER_AGENT;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

const MAX_RETRIES: u32 = 2;

/// Response from an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client shared by the direct-fetch and structured-query strategies.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
    retry_base: Duration,
}

impl HttpClient {
    /// Create a client presenting the same desktop user agent as the
    /// browser sessions.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(STEALTH_USER_AGENT)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(STEALTH_USER_AGENT)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
            retry_base: Duration::from_millis(500),
        }
    }

    /// Override the base of the exponential 5xx backoff.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// GET with retry on 5xx and backoff on 429.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.send_with_retry(&self.client, url, None).await {
            Ok(resp) => Ok(resp),
            Err(e) if looks_like_protocol_error(&e) => {
                debug!(url, "retrying over HTTP/1.1: {e}");
                self.send_with_retry(&self.h1_client, url, None).await
            }
            Err(e) => Err(e),
        }
    }

    /// POST a JSON document with the same retry policy as [`get`](Self::get).
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        extra_headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let post = PostJson {
            body,
            headers: extra_headers,
        };
        self.send_with_retry(&self.client, url, Some(&post)).await
    }

    async fn send_with_retry(
        &self,
        client: &reqwest::Client,
        url: &str,
        post: Option<&PostJson<'_>>,
    ) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let mut request = match post {
                Some(post) => {
                    let mut builder = client.post(url).json(post.body);
                    for (name, value) in post.headers {
                        builder = builder.header(*name, *value);
                    }
                    builder
                }
                None => client.get(url),
            };
            request = request.timeout(self.timeout);

            match request.send().await {
                Ok(r) => {
                    let status = r.status().as_u16();

                    // Retry on 5xx
                    if status >= 500 && retries < MAX_RETRIES {
                        retries += 1;
                        debug!(url, status, retries, "server error, retrying");
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }

                    // Backoff on 429
                    if status == 429 && retries < MAX_RETRIES {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        debug!(url, retry_after, "rate limited, backing off");
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let content_type = r
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body = r.text().await.context("failed to read response body")?;

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    if retries < MAX_RETRIES {
                        retries += 1;
                        debug!(url, retries, "request error, retrying: {e}");
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    fn backoff(&self, retries: u32) -> Duration {
        self.retry_base * 2u32.pow(retries.saturating_sub(1))
    }
}

struct PostJson<'a> {
    body: &'a serde_json::Value,
    headers: &'a [(&'a str, &'a str)],
}

fn looks_like_protocol_error(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}");
    text.contains("http2") || text.contains("protocol") || text.contains("connection closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).with_retry_base(Duration::ZERO);
        let resp = client.get(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "ok");
    }

    #[tokio::test]
    async fn test_get_returns_client_errors_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let resp = client.get(&format!("{}/missing", server.uri())).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_post_json_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("accept", "*/*"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let resp = client
            .post_json(
                &format!("{}/graphql", server.uri()),
                &serde_json::json!({"query": "{ a }"}),
                &[("Accept", "*/*")],
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 100 bytes, sends 5, hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                    .await;
            }
        });

        let client = HttpClient::new(Duration::from_secs(5)).with_retry_base(Duration::ZERO);
        let err = client.get(&format!("http://{addr}/")).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to read response body"));
    }
}
