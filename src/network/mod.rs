// Network module
//
// The network facility consumed by the cache controller: a request key goes
// in, a response snapshot (or a failure) comes out.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::cache::{RequestKey, ResponseSnapshot};

/// Network failure taxonomy
///
/// An HTTP error status is not a failure at this layer; only requests that
/// produced no response at all end up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Network facility used on cache misses and during install
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &RequestKey) -> Result<ResponseSnapshot, NetworkError>;
}

/// HTTP network facility backed by reqwest
///
/// Origin-relative request URLs are resolved against `origin`; absolute URLs
/// are used as-is.
#[derive(Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: reqwest::Url,
}

impl HttpNetwork {
    /// Create a new HTTP network facility
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidUrl` if the origin does not parse and
    /// `NetworkError::Transport` if the HTTP client cannot be created.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let origin = reqwest::Url::parse(origin).map_err(|e| NetworkError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport {
                url: origin.to_string(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &reqwest::Url {
        &self.origin
    }

    /// Resolve a request key to the absolute URL that will be fetched
    pub fn resolve(&self, request: &RequestKey) -> Result<reqwest::Url, NetworkError> {
        self.origin
            .join(&request.url)
            .map_err(|e| NetworkError::InvalidUrl {
                url: request.url.clone(),
                reason: e.to_string(),
            })
    }
}

fn classify(url: &reqwest::Url, err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &RequestKey) -> Result<ResponseSnapshot, NetworkError> {
        let url = self.resolve(request)?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            NetworkError::InvalidUrl {
                url: url.to_string(),
                reason: format!("invalid method '{}': {}", request.method, e),
            }
        })?;

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| classify(&url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(|e| match classify(&url, e) {
            NetworkError::Transport { url, reason } => NetworkError::Body { url, reason },
            other => other,
        })?;

        tracing::debug!(url = %url, status = status, bytes = body.len(), "Network fetch completed");

        Ok(ResponseSnapshot {
            status,
            headers,
            body,
            captured_at: Utc::now(),
        })
    }
}
