//! Search request and response models.

use serde::{Deserialize, Serialize};

use super::record::{Record, RecordBuilder, Topic};

/// Search query parameters sent to the book index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Catalogue to search
    pub topic: Topic,

    /// Language filter (e.g. "English")
    pub language: Option<String>,

    /// File format filter (e.g. "epub")
    pub format: Option<String>,
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>, topic: Topic) -> Self {
        Self {
            query: query.into(),
            topic,
            language: None,
            format: None,
        }
    }

    /// Set language filter
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set format filter
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// One raw, record-shaped entry as returned by the search service
///
/// Field names follow the remote payload, including `author(s)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Opaque id the service keyed this entry by
    #[serde(default)]
    pub id: String,

    #[serde(rename = "author(s)", default)]
    pub authors: Option<String>,

    #[serde(default)]
    pub series: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub language: String,

    /// Free-form file description, e.g. "EPUB / 1.2 MB"
    #[serde(default)]
    pub file: String,

    #[serde(default)]
    pub mirror1: String,

    #[serde(default)]
    pub mirror2: String,

    #[serde(default)]
    pub md5: String,

    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub extension: String,

    #[serde(default)]
    pub size: String,
}

impl RawEntry {
    /// Convert into a Record, optionally normalizing the title.
    ///
    /// Returns `None` when the entry has no usable title. Missing extension and
    /// size are recovered from the `file` description when possible.
    pub fn into_record(self, fallback_topic: Topic, normalize: bool) -> Option<Record> {
        let topic = self.topic.parse().unwrap_or(fallback_topic);
        let (file_ext, file_size) = split_file_description(&self.file);
        let extension = if self.extension.trim().is_empty() {
            file_ext
        } else {
            self.extension
        };
        let size = if self.size.trim().is_empty() {
            file_size
        } else {
            self.size
        };

        let mut builder = RecordBuilder::new(self.title.trim(), topic)
            .authors_raw(self.authors.as_deref().unwrap_or_default())
            .language(self.language.trim())
            .extension(extension)
            .size(size.trim())
            .content_id(self.md5)
            .mirror(self.mirror1)
            .mirror(self.mirror2);

        if let Some(series) = self.series {
            builder = builder.series(series);
        }
        if normalize {
            builder = builder.normalize_title();
        }

        builder.try_build()
    }
}

/// Split a file description like "EPUB / 1.2 MB" into (extension, size)
fn split_file_description(file: &str) -> (String, String) {
    match file.split_once('/') {
        Some((ext, size)) => (ext.trim().to_lowercase(), size.trim().to_string()),
        None => (String::new(), String::new()),
    }
}

/// Search response containing raw entries in service order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Entries found, in the order the service returned them
    pub entries: Vec<RawEntry>,

    /// Source of the results
    pub source: String,

    /// Query that was executed
    pub query: String,
}

impl SearchResponse {
    /// Create a new search response
    pub fn new(entries: Vec<RawEntry>, source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            entries,
            source: source.into(),
            query: query.into(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the response is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> RawEntry {
        RawEntry {
            id: "1".to_string(),
            authors: Some("Anthony Doerr".to_string()),
            title: title.to_string(),
            language: "English".to_string(),
            file: "EPUB / 1.2 MB".to_string(),
            mirror1: "http://library.lol/fiction/abc".to_string(),
            md5: "ABC".to_string(),
            topic: "fiction".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_raw_entry_deserializes_remote_field_names() {
        let json = r#"{
            "author(s)": "Doerr, Anthony",
            "series": null,
            "title": "Cloud Cuckoo Land",
            "language": "English",
            "file": "EPUB / 1 MB",
            "mirror1": "http://a",
            "mirror2": "http://b",
            "md5": "0123",
            "topic": "fiction",
            "extension": "epub",
            "size": "1 MB"
        }"#;

        let raw: RawEntry = serde_json::from_str(json).unwrap();
        assert_eq!(raw.authors.as_deref(), Some("Doerr, Anthony"));

        let record = raw.into_record(Topic::SciTech, false).unwrap();
        assert_eq!(record.authors, vec!["Doerr, Anthony"]);
        assert_eq!(record.topic, Topic::Fiction);
        assert_eq!(record.mirrors, vec!["http://a", "http://b"]);
        assert_eq!(record.content_id.as_deref(), Some("0123"));
    }

    #[test]
    fn test_into_record_recovers_extension_and_size_from_file() {
        let record = entry("Cloud Cuckoo Land").into_record(Topic::Fiction, false).unwrap();
        assert_eq!(record.extension, "epub");
        assert_eq!(record.size, "1.2 MB");
        assert_eq!(record.mirrors.len(), 1);
    }

    #[test]
    fn test_into_record_normalizes_when_requested() {
        let raw = entry("Cloud Cuckoo Land ISBN: 9781982168438");
        let normalized = raw.clone().into_record(Topic::Fiction, true).unwrap();
        let untouched = raw.into_record(Topic::Fiction, false).unwrap();

        assert_eq!(normalized.title, "Cloud Cuckoo Land");
        assert_eq!(untouched.title, "Cloud Cuckoo Land ISBN: 9781982168438");
    }

    #[test]
    fn test_into_record_rejects_empty_title() {
        assert!(entry("   ").into_record(Topic::Fiction, true).is_none());
    }
}
