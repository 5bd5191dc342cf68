//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{RawEntry, SearchQuery, SearchResponse, Topic};
use crate::sources::{Source, SourceError, Timeouts};

type MirrorReply = Result<Vec<String>, SourceError>;

/// A mock source for testing that returns predefined responses.
///
/// Mirror replies are queued; once the queue is drained the fallback list (if
/// any) is returned on every call.
#[derive(Debug, Default)]
pub struct MockSource {
    search_response: Mutex<Option<SearchResponse>>,
    mirror_replies: Mutex<VecDeque<MirrorReply>>,
    mirror_fallback: Mutex<Option<Vec<String>>>,
    search_calls: AtomicUsize,
    mirror_calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search response to return.
    pub fn set_search_response(&self, response: SearchResponse) {
        let mut guard = self.search_response.lock().unwrap();
        *guard = Some(response);
    }

    /// Queue one reply for the next `mirror_links` call.
    pub fn push_mirror_reply(&self, reply: MirrorReply) {
        self.mirror_replies.lock().unwrap().push_back(reply);
    }

    /// Set the list returned once queued replies are used up.
    pub fn set_mirror_links(&self, links: Vec<String>) {
        *self.mirror_fallback.lock().unwrap() = Some(links);
    }

    /// Number of search calls made so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of mirror lookups made so far.
    pub fn mirror_calls(&self) -> usize {
        self.mirror_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.search_response.lock().unwrap();
        match &*guard {
            Some(response) => Ok(response.clone()),
            None => Ok(SearchResponse::new(Vec::new(), "Mock Source", &query.query)),
        }
    }

    async fn mirror_links(
        &self,
        content_id: &str,
        _topic: Topic,
        _timeouts: Timeouts,
    ) -> Result<Vec<String>, SourceError> {
        self.mirror_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.mirror_replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.mirror_fallback
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SourceError::NotFound(format!("no mirrors for {}", content_id)))
    }
}

/// Helper function to create a raw entry for testing.
pub fn make_entry(id: &str, title: &str, authors: &str, md5: &str) -> RawEntry {
    RawEntry {
        id: id.to_string(),
        authors: Some(authors.to_string()),
        title: title.to_string(),
        language: "English".to_string(),
        file: "EPUB / 1 MB".to_string(),
        md5: md5.to_string(),
        topic: "fiction".to_string(),
        extension: "epub".to_string(),
        size: "1 MB".to_string(),
        ..Default::default()
    }
}
