//! Core data models for book records and search operations.

mod record;
mod search;

pub use record::{normalize_title, Record, RecordBuilder, Topic, ISBN_MARKER};
pub use search::{RawEntry, SearchQuery, SearchResponse};
