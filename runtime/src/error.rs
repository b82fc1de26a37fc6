// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for scraping and extraction.
//!
//! Strategy and extractor code returns [`ScrapeError`] so the selector can
//! tell a recoverable strategy failure from a missing mapping. Stage,
//! storage and broker code works in `anyhow::Result` and converts at the
//! stage boundary.

use thiserror::Error;

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The source answered but nothing usable matched.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A strategy variant is missing a field it requires.
    #[error("invalid {strategy} configuration: {reason}")]
    InvalidConfig {
        strategy: &'static str,
        reason: String,
    },

    #[error("no scraping mapping found for site '{0}'")]
    NoMappingFound(String),

    #[error("all strategies failed for site '{site}': {}", .failures.join("; "))]
    AllStrategiesFailed { site: String, failures: Vec<String> },

    #[error("navigation to {url} failed after {attempts} attempts")]
    NavigationFailed { url: String, attempts: u32 },

    #[error("element '{selector}' not visible within {timeout_ms}ms")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_strategies_failed_joins_reasons() {
        let err = ScrapeError::AllStrategiesFailed {
            site: "Payngo".to_string(),
            failures: vec![
                "DirectHTTP: HTTP 404 from https://x".to_string(),
                "BrowserDriven: navigation failed".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("Payngo"));
        assert!(text.contains("HTTP 404"));
        assert!(text.contains("; BrowserDriven"));
    }

    #[test]
    fn test_decode_from_serde() {
        let err: ScrapeError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ScrapeError::Decode(_)));
    }
}
