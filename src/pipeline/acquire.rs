//! The match-and-acquire loop.
//!
//! Candidates are tried in order. Each attempt walks
//! `Pending -> Resolving -> Probing -> Downloading` and ends in an
//! [`AttemptOutcome`]. Only the first candidate is retried, and only after a
//! transient failure; everything else moves on to the next candidate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::downloader::PARTIAL_SUFFIX;
use super::{
    DownloadOutcome, Downloader, MatchEngine, MirrorResolver, MirrorSelection, PipelineError,
    SearchSession,
};
use crate::config::Config;
use crate::models::Record;
use crate::sources::{Source, SourceError};
use crate::utils::{unique_path, HttpClient, RetryConfig};

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Resolving,
    Probing,
    Downloading,
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttemptState::Pending => "pending",
            AttemptState::Resolving => "resolving",
            AttemptState::Probing => "probing",
            AttemptState::Downloading => "downloading",
        };
        f.write_str(name)
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No mirror could be used
    NoMirrors,
    /// Mirror lookup for the content id failed
    Resolution(String),
    /// The download itself failed
    Download(String),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::NoMirrors => write!(f, "no available mirrors"),
            AttemptFailure::Resolution(reason) => write!(f, "resolution failed: {}", reason),
            AttemptFailure::Download(reason) => write!(f, "download failed: {}", reason),
        }
    }
}

/// Result of one attempt at one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded { path: PathBuf, bytes: u64 },
    FailedTerminal(AttemptFailure),
    FailedTransient(AttemptFailure),
}

/// A successful acquisition
#[derive(Debug, Clone)]
pub struct AcquireReport {
    /// The candidate that was downloaded
    pub record: Record,
    /// Final location of the file
    pub path: PathBuf,
    pub bytes: u64,
    /// Attempts spent across all candidates
    pub attempts: u32,
}

/// Runs the match-and-acquire loop.
#[derive(Debug, Clone)]
pub struct Acquirer {
    resolver: MirrorResolver,
    downloader: Downloader,
    engine: MatchEngine,
    retry: RetryConfig,
    staging: PathBuf,
    destination: PathBuf,
    verify_checksum: bool,
}

impl Acquirer {
    pub fn new(
        resolver: MirrorResolver,
        downloader: Downloader,
        staging: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            downloader,
            engine: MatchEngine::default(),
            retry: RetryConfig::default(),
            staging: staging.into(),
            destination: destination.into(),
            verify_checksum: false,
        }
    }

    /// Build an acquirer from configuration
    pub fn from_config(index: Arc<dyn Source>, config: &Config) -> Result<Self, PipelineError> {
        let probe_client = HttpClient::with_timeouts(
            config.mirrors.connect_timeout(),
            config.mirrors.probe_timeout(),
        )
        .map_err(PipelineError::Client)?;
        let download_client = HttpClient::with_timeouts(
            config.mirrors.connect_timeout(),
            config.downloads.timeout(),
        )
        .map_err(PipelineError::Client)?;

        let resolver = MirrorResolver::new(index, probe_client)
            .timeouts(config.mirrors.timeouts())
            .probe_timeout(config.mirrors.probe_timeout());

        Ok(Self::new(
            resolver,
            Downloader::new(download_client),
            &config.downloads.staging,
            &config.downloads.destination,
        )
        .engine(MatchEngine::new(config.matching.author_policy))
        .retry(config.retry.to_retry_config())
        .verify_checksum(config.downloads.verify_checksum))
    }

    pub fn engine(mut self, engine: MatchEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Compare each download's MD5 with the record's content id
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Match `session`'s records against (author, title) and download the
    /// first candidate that works.
    pub async fn acquire(
        &self,
        session: &SearchSession,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<AcquireReport, PipelineError> {
        let candidates = self.engine.filter(session.results(), author, title)?;
        tracing::info!(
            "{} candidate(s) for '{}' out of {} record(s)",
            candidates.len(),
            session.query(),
            session.results().len()
        );
        self.acquire_candidates(&candidates).await
    }

    /// Try `candidates` in order
    pub async fn acquire_candidates(&self, candidates: &[Record]) -> Result<AcquireReport, PipelineError> {
        if candidates.is_empty() {
            tracing::warn!("No candidates to acquire");
            return Err(PipelineError::NoMatch);
        }

        tokio::fs::create_dir_all(&self.staging).await?;

        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut total_attempts: u32 = 0;

        for (position, record) in candidates.iter().enumerate() {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                total_attempts += 1;
                tracing::debug!(
                    "Candidate {} '{}' attempt {}: {}",
                    position,
                    record.title,
                    attempts,
                    AttemptState::Pending
                );

                match self.attempt(record).await {
                    AttemptOutcome::Succeeded { path, bytes } => {
                        let path = self.collect_staged(&path).await;
                        tracing::info!("Acquired '{}' at {}", record.title, path.display());
                        return Ok(AcquireReport {
                            record: record.clone(),
                            path,
                            bytes,
                            attempts: total_attempts,
                        });
                    }
                    AttemptOutcome::FailedTerminal(failure) => {
                        tracing::warn!("'{}' failed: {}", record.title, failure);
                        failures.push(failure);
                        break;
                    }
                    AttemptOutcome::FailedTransient(failure) => {
                        if position == 0 && self.retry.allows_another(attempts) {
                            tracing::warn!(
                                "'{}' failed transiently ({}), retrying in {:?} ({}/{})",
                                record.title,
                                failure,
                                self.retry.delay,
                                attempts,
                                self.retry.max_retries
                            );
                            tokio::time::sleep(self.retry.delay).await;
                            continue;
                        }
                        tracing::warn!("'{}' failed: {}", record.title, failure);
                        failures.push(failure);
                        break;
                    }
                }
            }
        }

        if failures.iter().all(|f| *f == AttemptFailure::NoMirrors) {
            tracing::warn!("All {} candidate(s) ran out of mirrors", candidates.len());
            Err(PipelineError::NoMirrors)
        } else {
            tracing::warn!("None of {} candidate(s) could be downloaded", candidates.len());
            Err(PipelineError::NoMatch)
        }
    }

    /// One pass over one candidate
    pub async fn attempt(&self, record: &Record) -> AttemptOutcome {
        tracing::debug!("'{}': {}", record.title, AttemptState::Resolving);
        let urls = match &record.content_id {
            Some(content_id) => match self.resolver.resolve(content_id, record.topic).await {
                Ok(urls) => urls,
                Err(PipelineError::Resolution(SourceError::NotFound(reason))) => {
                    tracing::debug!("No mirrors listed for {}: {}", content_id, reason);
                    return AttemptOutcome::FailedTerminal(AttemptFailure::NoMirrors);
                }
                Err(err) => {
                    let failure = AttemptFailure::Resolution(err.to_string());
                    return if err.is_transient() {
                        AttemptOutcome::FailedTransient(failure)
                    } else {
                        AttemptOutcome::FailedTerminal(failure)
                    };
                }
            },
            None => record.mirrors.clone(),
        };

        if urls.is_empty() {
            return AttemptOutcome::FailedTerminal(AttemptFailure::NoMirrors);
        }

        tracing::debug!("'{}': {} over {} url(s)", record.title, AttemptState::Probing, urls.len());
        let url = match self.resolver.select(&urls).await {
            MirrorSelection::Found(url) => url,
            MirrorSelection::Exhausted { transient: true } => {
                return AttemptOutcome::FailedTransient(AttemptFailure::NoMirrors)
            }
            MirrorSelection::Exhausted { transient: false } => {
                return AttemptOutcome::FailedTerminal(AttemptFailure::NoMirrors)
            }
        };

        tracing::debug!("'{}': {} from {}", record.title, AttemptState::Downloading, url);
        let expected = record
            .content_id
            .as_deref()
            .filter(|_| self.verify_checksum);
        match self.downloader.download_checked(&url, &self.staging, expected).await {
            Ok(DownloadOutcome::Success { path, bytes }) => AttemptOutcome::Succeeded { path, bytes },
            Ok(DownloadOutcome::Failure { reason }) => {
                AttemptOutcome::FailedTerminal(AttemptFailure::Download(reason))
            }
            Err(err) if err.is_transient() => {
                AttemptOutcome::FailedTransient(AttemptFailure::Download(err.to_string()))
            }
            Err(err) => AttemptOutcome::FailedTerminal(AttemptFailure::Download(err.to_string())),
        }
    }

    /// Move finished files from staging into the destination.
    ///
    /// Best-effort: failures are logged. Returns where `downloaded` ended up,
    /// which is its staged path if it could not be moved.
    async fn collect_staged(&self, downloaded: &Path) -> PathBuf {
        let mut result = downloaded.to_path_buf();

        if let Err(err) = tokio::fs::create_dir_all(&self.destination).await {
            tracing::warn!("Cannot create {}: {}", self.destination.display(), err);
            return result;
        }

        if same_directory(&self.staging, &self.destination).await {
            tracing::debug!("Staging is the destination; nothing to move");
            return result;
        }

        let mut entries = match tokio::fs::read_dir(&self.staging).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Cannot read {}: {}", self.staging.display(), err);
                return result;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!("Cannot list {}: {}", self.staging.display(), err);
                    break;
                }
            };

            let staged = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file || name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }

            let target = unique_path(&self.destination, &name);
            match move_file(&staged, &target).await {
                Ok(()) => {
                    tracing::debug!("Moved {} to {}", staged.display(), target.display());
                    if staged == downloaded {
                        result = target;
                    }
                }
                Err(err) => tracing::warn!("Cannot move {}: {}", staged.display(), err),
            }
        }

        result
    }
}

async fn same_directory(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Rename, falling back to copy and delete across filesystems
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}
