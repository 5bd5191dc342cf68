//! # autobook
//!
//! Search the Library Genesis book index, pick a match by author and title,
//! and download it through whichever mirror answers.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Record, SearchQuery, etc.)
//! - [`sources`]: Book index clients behind the [`Source`] trait
//! - [`pipeline`]: Search sessions, matching, mirror probing, downloads and the acquisition loop
//! - [`utils`]: HTTP client, retry policy and file name helpers
//! - [`ui`]: Tables and spinners for the command-line front end
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::{Record, Topic};
pub use pipeline::{Acquirer, MatchEngine, PipelineError, SearchRequest, SearchSession, Workspace};
pub use sources::{LibgenSource, Source};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
