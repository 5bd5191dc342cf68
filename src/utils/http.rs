//! HTTP client utilities.

use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeouts(Duration::from_secs(10), Duration::from_secs(60))
    }

    /// Create a client with a connect timeout and an overall request timeout
    pub fn with_timeouts(connect: Duration, request: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(request)
            .connect_timeout(connect)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a HEAD request
    pub fn head(&self, url: &str) -> RequestBuilder {
        self.client.head(url)
    }
}
