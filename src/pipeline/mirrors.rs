//! Mirror resolution and availability probing.

use std::sync::Arc;
use std::time::Duration;

use super::PipelineError;
use crate::models::Topic;
use crate::sources::{Source, Timeouts};
use crate::utils::{HttpClient, TransientError};

/// Default timeout for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing one mirror URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The mirror answered `200 OK`
    Available,
    /// The mirror answered, but not with `200 OK` (or the URL is unusable)
    Rejected(String),
    /// Timeout or connection failure
    Unreachable(String),
}

impl ProbeStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ProbeStatus::Available)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Available => write!(f, "available"),
            ProbeStatus::Rejected(reason) => write!(f, "rejected ({})", reason),
            ProbeStatus::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

/// Outcome of probing a URL list in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorSelection {
    /// First URL that answered `200 OK`
    Found(String),
    /// No URL was available; `transient` is set when at least one was
    /// unreachable rather than rejected
    Exhausted { transient: bool },
}

/// Lists download URLs for a content id and probes them.
#[derive(Debug, Clone)]
pub struct MirrorResolver {
    index: Arc<dyn Source>,
    client: HttpClient,
    timeouts: Timeouts,
    probe_timeout: Duration,
}

impl MirrorResolver {
    pub fn new(index: Arc<dyn Source>, client: HttpClient) -> Self {
        Self {
            index,
            client,
            timeouts: Timeouts::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Connect/read timeouts for mirror-metadata lookups
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Timeout applied by [`MirrorResolver::select`] to each probe
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Candidate download URLs for `content_id`, in preference order
    pub async fn resolve(&self, content_id: &str, topic: Topic) -> Result<Vec<String>, PipelineError> {
        let urls = self
            .index
            .mirror_links(content_id, topic, self.timeouts)
            .await
            .map_err(PipelineError::Resolution)?;
        tracing::debug!("Resolved {} mirror(s) for {}", urls.len(), content_id);
        Ok(urls)
    }

    /// HEAD `url` and report how it answered. Never fails.
    pub async fn probe_status(&self, url: &str, timeout: Duration) -> ProbeStatus {
        let status = match self.client.head(url).timeout(timeout).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => ProbeStatus::Available,
            Ok(response) => ProbeStatus::Rejected(response.status().to_string()),
            Err(err) if TransientError::from_reqwest_error(&err).is_some() => {
                ProbeStatus::Unreachable(err.to_string())
            }
            Err(err) => ProbeStatus::Rejected(err.to_string()),
        };
        tracing::debug!("Probe {}: {}", url, status);
        status
    }

    /// True only when `url` answers a HEAD request with `200 OK`
    pub async fn probe(&self, url: &str, timeout: Duration) -> bool {
        self.probe_status(url, timeout).await.is_available()
    }

    /// Probe `urls` in order and pick the first available one
    pub async fn select(&self, urls: &[String]) -> MirrorSelection {
        let mut transient = false;
        for url in urls {
            match self.probe_status(url, self.probe_timeout).await {
                ProbeStatus::Available => return MirrorSelection::Found(url.clone()),
                ProbeStatus::Unreachable(_) => transient = true,
                ProbeStatus::Rejected(_) => {}
            }
        }
        MirrorSelection::Exhausted { transient }
    }
}
