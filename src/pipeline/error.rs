//! Error types for the search and acquisition pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::sources::SourceError;
use crate::utils::TransientError;

/// Coarse classification of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or misuse; never retried
    Usage,
    /// Network trouble that a retry may fix
    TransientNetwork,
    /// The remote side gave a definite answer
    TerminalRemote,
    /// Every candidate or mirror was tried
    Exhaustion,
    Other,
}

/// Errors raised by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Blank or otherwise unusable query
    #[error("Invalid query: {0}")]
    Query(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    State(String),

    /// Malformed filter input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The index search failed
    #[error("Search failed: {0}")]
    Search(#[source] SourceError),

    /// Mirror lookup for a content id failed
    #[error("Mirror resolution failed: {0}")]
    Resolution(#[source] SourceError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[source] SourceError),

    #[error("No available mirrors to download from.")]
    NoMirrors,

    #[error("No matching book could be downloaded.")]
    NoMatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Query(_) | PipelineError::State(_) | PipelineError::Validation(_) => {
                ErrorKind::Usage
            }
            PipelineError::Search(err) | PipelineError::Resolution(err) => {
                if TransientError::from_source_error(err).is_some() {
                    ErrorKind::TransientNetwork
                } else {
                    ErrorKind::TerminalRemote
                }
            }
            PipelineError::Download(err) if err.is_transient() => ErrorKind::TransientNetwork,
            PipelineError::Download(_) => ErrorKind::Other,
            PipelineError::NoMirrors | PipelineError::NoMatch => ErrorKind::Exhaustion,
            PipelineError::Client(_) | PipelineError::Io(_) | PipelineError::Config(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Whether the acquisition loop may retry after this error
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }
}

/// Errors that can occur while streaming a file to disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS, connection reset, body read failure, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout { url: String },

    /// File system error while writing the download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl DownloadError {
    /// Classify a reqwest error raised for `url`
    pub fn network(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
            }
        } else {
            DownloadError::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DownloadError::Network { .. } | DownloadError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PipelineError::Query("".into()).kind(), ErrorKind::Usage);
        assert_eq!(PipelineError::State("no search".into()).kind(), ErrorKind::Usage);
        assert_eq!(PipelineError::Validation("author".into()).kind(), ErrorKind::Usage);
        assert_eq!(PipelineError::NoMirrors.kind(), ErrorKind::Exhaustion);
        assert_eq!(PipelineError::NoMatch.kind(), ErrorKind::Exhaustion);

        let transient = PipelineError::Resolution(SourceError::Timeout("read".into()));
        assert_eq!(transient.kind(), ErrorKind::TransientNetwork);
        assert!(transient.is_transient());

        let terminal = PipelineError::Resolution(SourceError::NotFound("md5".into()));
        assert_eq!(terminal.kind(), ErrorKind::TerminalRemote);
        assert!(!terminal.is_transient());
    }

    #[test]
    fn test_download_error_classification() {
        let timeout = DownloadError::Timeout {
            url: "http://x".into(),
        };
        assert!(timeout.is_transient());

        let io = DownloadError::io("/tmp/x", std::io::Error::other("disk full"));
        assert!(!io.is_transient());
        assert_eq!(PipelineError::from(io).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            PipelineError::NoMirrors.to_string(),
            "No available mirrors to download from."
        );
    }
}
