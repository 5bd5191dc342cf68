//! Search sessions: one query against the index and the Records it produced.

use std::sync::Arc;

use super::{MatchEngine, PipelineError};
use crate::models::{Record, SearchQuery, Topic};
use crate::sources::Source;

/// Parameters of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub topic: Topic,
    /// Strip `ISBN:` suffixes from titles
    pub normalize: bool,
    pub language: Option<String>,
    pub format: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, topic: Topic) -> Self {
        Self {
            query: query.into(),
            topic,
            normalize: true,
            language: None,
            format: None,
        }
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.query.trim(), self.topic);
        query.language = self.language.clone().filter(|l| !l.trim().is_empty());
        query.format = self.format.clone().filter(|f| !f.trim().is_empty());
        query
    }
}

/// The Records of one search, plus the matched subset once a match has run.
///
/// Sessions are never updated in place: a new search produces a new session
/// and [`SearchSession::apply_match`] consumes the old one.
#[derive(Debug)]
pub struct SearchSession {
    index: Arc<dyn Source>,
    request: SearchRequest,
    results: Vec<Record>,
    matched: Option<Vec<Record>>,
}

impl SearchSession {
    /// Run one search against `index`.
    ///
    /// A blank query is rejected before any network call. Search errors are
    /// returned as-is; there is no retry here.
    pub async fn search(
        index: Arc<dyn Source>,
        request: SearchRequest,
    ) -> Result<Self, PipelineError> {
        if request.query.trim().is_empty() {
            return Err(PipelineError::Query("query is empty".to_string()));
        }

        let response = index
            .search(&request.to_query())
            .await
            .map_err(PipelineError::Search)?;

        let total = response.len();
        let results: Vec<Record> = response
            .entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id.clone();
                let record = entry.into_record(request.topic, request.normalize);
                if record.is_none() {
                    tracing::warn!("Dropping entry {} from {}: empty title", id, index.name());
                }
                record
            })
            .collect();

        tracing::info!(
            "Search '{}' on {} returned {} record(s) ({} raw)",
            request.query.trim(),
            index.name(),
            results.len(),
            total
        );

        Ok(Self {
            index,
            request,
            results,
            matched: None,
        })
    }

    pub fn query(&self) -> &str {
        &self.request.query
    }

    pub fn topic(&self) -> Topic {
        self.request.topic
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Handle to the index this session searched
    pub fn index(&self) -> &Arc<dyn Source> {
        &self.index
    }

    /// All Records, in index order
    pub fn results(&self) -> &[Record] {
        &self.results
    }

    /// Matched subset; `None` until [`SearchSession::apply_match`] runs
    pub fn matched(&self) -> Option<&[Record]> {
        self.matched.as_deref()
    }

    /// Record by row index
    pub fn record(&self, index: usize) -> Result<&Record, PipelineError> {
        self.results.get(index).ok_or_else(|| {
            PipelineError::State(format!(
                "no record at index {} ({} result(s))",
                index,
                self.results.len()
            ))
        })
    }

    /// Run `engine` over the results and keep the matched subset
    pub fn apply_match(
        self,
        engine: &MatchEngine,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let matched = engine.filter(&self.results, author, title)?;
        tracing::debug!("{} of {} record(s) matched", matched.len(), self.results.len());
        Ok(Self {
            matched: Some(matched),
            ..self
        })
    }
}

/// Holds the caller's current session.
#[derive(Debug)]
pub struct Workspace {
    index: Arc<dyn Source>,
    current: Option<SearchSession>,
}

impl Workspace {
    pub fn new(index: Arc<dyn Source>) -> Self {
        Self {
            index,
            current: None,
        }
    }

    /// Search and replace the current session.
    ///
    /// On failure the previous session is kept.
    pub async fn search(&mut self, request: SearchRequest) -> Result<&SearchSession, PipelineError> {
        let session = SearchSession::search(Arc::clone(&self.index), request).await?;
        Ok(self.current.insert(session))
    }

    pub fn session(&self) -> Option<&SearchSession> {
        self.current.as_ref()
    }

    /// Results of the current session
    pub fn get_results(&self) -> Result<&[Record], PipelineError> {
        self.current
            .as_ref()
            .map(SearchSession::results)
            .ok_or_else(|| PipelineError::State("no search has been run".to_string()))
    }

    /// Take the current session out, e.g. to apply a match to it
    pub fn take_session(&mut self) -> Option<SearchSession> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawEntry, SearchResponse};
    use crate::sources::mock::make_entry;
    use crate::sources::MockSource;

    fn mock_with(entries: Vec<RawEntry>) -> Arc<MockSource> {
        let mock = Arc::new(MockSource::new());
        mock.set_search_response(SearchResponse::new(entries, "Mock Source", "q"));
        mock
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_call() {
        let mock = mock_with(vec![]);
        for query in ["", "   ", "\t\n"] {
            let result =
                SearchSession::search(mock.clone(), SearchRequest::new(query, Topic::Fiction)).await;
            assert!(matches!(result, Err(PipelineError::Query(_))));
        }
        assert_eq!(mock.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_converts_entries_in_order() {
        let mut untitled = make_entry("3", "", "Nobody", "");
        untitled.title = "  ".to_string();
        let mock = mock_with(vec![
            make_entry("1", "Cloud Cuckoo Land ISBN: 9781982168438", "Anthony Doerr", "AAA"),
            untitled,
            make_entry("2", "About Grace", "Doerr, Anthony", "BBB"),
        ]);

        let session = SearchSession::search(
            mock.clone(),
            SearchRequest::new("doerr", Topic::Fiction),
        )
        .await
        .unwrap();

        assert_eq!(mock.search_calls(), 1);
        let titles: Vec<_> = session.results().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Cloud Cuckoo Land", "About Grace"]);
        assert_eq!(session.results()[0].content_id.as_deref(), Some("aaa"));
        assert!(session.matched().is_none());
        assert_eq!(session.query(), "doerr");
    }

    #[tokio::test]
    async fn test_search_without_normalization_keeps_raw_title() {
        let mock = mock_with(vec![make_entry(
            "1",
            "Cloud Cuckoo Land ISBN: 9781982168438",
            "Anthony Doerr",
            "AAA",
        )]);

        let session = SearchSession::search(
            mock,
            SearchRequest::new("cloud", Topic::Fiction).normalize(false),
        )
        .await
        .unwrap();

        assert_eq!(session.results()[0].title, "Cloud Cuckoo Land ISBN: 9781982168438");
    }

    #[tokio::test]
    async fn test_apply_match_and_record_selection() {
        let mock = mock_with(vec![
            make_entry("1", "Cloud Cuckoo Land", "Anthony Doerr", "AAA"),
            make_entry("2", "Other Book", "Jane Doe", "BBB"),
        ]);
        let session = SearchSession::search(mock, SearchRequest::new("q", Topic::Fiction))
            .await
            .unwrap();

        assert_eq!(session.record(1).unwrap().title, "Other Book");
        assert!(matches!(session.record(2), Err(PipelineError::State(_))));

        let session = session
            .apply_match(&MatchEngine::default(), Some("Anthony Doerr"), None)
            .unwrap();
        let matched = session.matched().unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Cloud Cuckoo Land");
        assert_eq!(session.results().len(), 2);
    }

    #[tokio::test]
    async fn test_workspace_replaces_session() {
        let mock = mock_with(vec![make_entry("1", "First", "Jane Doe", "AAA")]);
        let mut workspace = Workspace::new(mock.clone());

        assert!(matches!(workspace.get_results(), Err(PipelineError::State(_))));
        assert!(workspace.session().is_none());

        workspace
            .search(SearchRequest::new("first", Topic::Fiction))
            .await
            .unwrap();
        assert_eq!(workspace.get_results().unwrap().len(), 1);

        mock.set_search_response(SearchResponse::new(
            vec![
                make_entry("2", "Second", "Jane Doe", "BBB"),
                make_entry("3", "Third", "Jane Doe", "CCC"),
            ],
            "Mock Source",
            "second",
        ));
        workspace
            .search(SearchRequest::new("second", Topic::Fiction))
            .await
            .unwrap();
        assert_eq!(workspace.session().unwrap().query(), "second");
        assert_eq!(workspace.get_results().unwrap().len(), 2);

        // A failed search leaves the current session alone
        assert!(workspace.search(SearchRequest::new(" ", Topic::Fiction)).await.is_err());
        assert_eq!(workspace.session().unwrap().query(), "second");
    }
}
