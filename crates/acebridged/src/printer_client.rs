//! Printer Client - queries the Moonraker object API for printer status.
//!
//! One GET per cycle, bounded by the configured timeout. The query names
//! exactly the printer objects the translator reads.

use acebridge_common::{queried_objects, RawStatus, StatusError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const QUERY_PATH: &str = "/printer/objects/query";

/// Printer fetch errors. All of them are recoverable: the cycle is skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Response is not JSON: {0}")]
    Decode(String),

    #[error("Unexpected response: {0}")]
    Envelope(#[from] StatusError),
}

/// Source of printer status documents
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current status, or explain why none is available
    async fn fetch(&self) -> Result<RawStatus, FetchError>;
}

/// HTTP client for a single printer
pub struct PrinterClient {
    url: String,
    http: reqwest::Client,
}

impl PrinterClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("acebridged/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url: query_url(host, port),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusSource for PrinterClient {
    async fn fetch(&self) -> Result<RawStatus, FetchError> {
        debug!("Querying printer: {}", self.url);
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        parse_response(&body)
    }
}

/// Build the object query URL for a printer
pub fn query_url(host: &str, port: u16) -> String {
    let objects: Vec<String> = queried_objects()
        .into_iter()
        .map(|object| object.replace(' ', "%20"))
        .collect();
    format!("http://{}:{}{}?{}", host, port, QUERY_PATH, objects.join("&"))
}

/// Decode a response body and unwrap its `result.status` envelope
pub fn parse_response(body: &[u8]) -> Result<RawStatus, FetchError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(RawStatus::from_envelope(value)?)
}
