//! Book index clients.
//!
//! This module defines the [`Source`] trait that remote book indexes implement.
//! A source answers two questions: what books match a query, and where can the
//! file behind a content hash be fetched from.
//!
//! - [`LibgenSource`] scrapes the Library Genesis fiction and sci-tech catalogues
//!   and the mirror-metadata pages.
//! - [`MockSource`] returns canned responses and records calls, for tests.

mod libgen;
pub mod mock;

pub use libgen::{LibgenSource, LIBGEN_FICTION_URL, LIBGEN_MIRROR_URL, LIBGEN_SCITECH_URL};
pub use mock::MockSource;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{SearchQuery, SearchResponse, Topic};

/// Connect/read timeout pair for remote metadata requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Timeouts {
    pub fn new(connect: Duration, read: Duration) -> Self {
        Self { connect, read }
    }

    /// Upper bound for a whole request
    pub fn total(&self) -> Duration {
        self.connect + self.read
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(20),
        }
    }
}

/// The Source trait defines the interface of a remote book index.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Search the index. Entries come back in service order.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError>;

    /// List candidate download URLs for a content hash, in preference order
    async fn mirror_links(
        &self,
        content_id: &str,
        topic: Topic,
        timeouts: Timeouts,
    ) -> Result<Vec<String>, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Parsing error (unexpected HTML)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Book or mirror not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}
