//! Utility modules supporting search and acquisition.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts and a user agent
//! - [`RetryConfig`]: fixed-delay retry bound for the acquisition loop
//! - [`TransientError`]: classification of errors that a retry may fix
//! - [`sanitize_filename`]: make remote file names safe to write locally

mod filename;
mod http;
mod retry;

pub use filename::{
    filename_from_content_disposition, filename_from_url, sanitize_filename, unique_path,
};
pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use retry::{RetryConfig, TransientError, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
