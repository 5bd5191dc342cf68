//! Search-result resolution and download acquisition.
//!
//! - [`SearchSession`] / [`Workspace`]: query the index and hold the Records
//! - [`MatchEngine`]: narrow Records by author and title
//! - [`MirrorResolver`]: list download URLs for a content id and probe them
//! - [`Downloader`]: stream a URL to disk
//! - [`Acquirer`]: match, resolve, probe and download with retry

mod acquire;
mod downloader;
mod error;
mod matcher;
mod mirrors;
mod session;

pub use acquire::{AcquireReport, Acquirer, AttemptFailure, AttemptOutcome, AttemptState};
pub use downloader::{DownloadOutcome, Downloader, PARTIAL_SUFFIX, WRITE_BUFFER_SIZE};
pub use error::{DownloadError, ErrorKind, PipelineError};
pub use matcher::{AuthorMatch, MatchEngine};
pub use mirrors::{MirrorResolver, MirrorSelection, ProbeStatus, DEFAULT_PROBE_TIMEOUT};
pub use session::{SearchRequest, SearchSession, Workspace};
