//! Record model representing one normalized hit from the book index.

use serde::{Deserialize, Serialize};

/// Marker some catalogue entries append to the title, followed by identifiers.
pub const ISBN_MARKER: &str = "ISBN:";

/// The catalogue a book lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    #[default]
    Fiction,
    SciTech,
}

impl Topic {
    /// Returns the display name of the topic
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Fiction => "Fiction",
            Topic::SciTech => "Sci-Tech",
        }
    }

    /// Returns the identifier used by the remote index
    pub fn id(&self) -> &'static str {
        match self {
            Topic::Fiction => "fiction",
            Topic::SciTech => "sci-tech",
        }
    }

    /// Path segment the mirror-metadata service uses for this topic
    pub fn mirror_path(&self) -> &'static str {
        match self {
            Topic::Fiction => "fiction",
            Topic::SciTech => "main",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fiction" => Ok(Topic::Fiction),
            "sci-tech" | "scitech" | "sci_tech" | "main" => Ok(Topic::SciTech),
            other => Err(format!("unknown topic: {}", other)),
        }
    }
}

/// Strip trailing catalogue metadata (an embedded `ISBN:` tag) from a title.
///
/// Keeps the part before the first marker. A title without the marker, or one
/// that would become empty, is returned unchanged, so applying this twice is
/// the same as applying it once.
pub fn normalize_title(title: &str) -> String {
    match title.split_once(ISBN_MARKER) {
        Some((head, _)) if !head.trim().is_empty() => head.trim().to_string(),
        _ => title.to_string(),
    }
}

/// A book found in the index
///
/// Records are built once from a raw search entry and are not mutated after
/// that. The mirror list order is the probing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Author names in listed order (may be empty)
    pub authors: Vec<String>,

    /// Series the book belongs to
    pub series: Option<String>,

    /// Book title (never empty)
    pub title: String,

    /// Language of the book
    pub language: String,

    /// File format / extension, lower-cased
    pub extension: String,

    /// Unit-tagged size, e.g. "12 MB"
    pub size: String,

    /// Catalogue the book was found in
    pub topic: Topic,

    /// Content hash identifying the file across mirrors
    pub content_id: Option<String>,

    /// Mirror page URLs, in preference order
    pub mirrors: Vec<String>,
}

impl Record {
    /// Create a new record with the required fields
    pub fn new(title: String, topic: Topic) -> Self {
        Self {
            authors: Vec::new(),
            series: None,
            title,
            language: String::new(),
            extension: String::new(),
            size: String::new(),
            topic,
            content_id: None,
            mirrors: Vec::new(),
        }
    }

    /// Authors joined for display
    pub fn authors_display(&self) -> String {
        self.authors.join("; ")
    }
}

/// Builder for constructing Record objects
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Create a new builder with required fields.
    ///
    /// The title is not checked here; use [`RecordBuilder::try_build`] when it
    /// comes from untrusted input.
    pub fn new(title: impl Into<String>, topic: Topic) -> Self {
        Self {
            record: Record::new(title.into(), topic),
        }
    }

    /// Set authors from a raw `;`-separated author string
    pub fn authors_raw(mut self, raw: &str) -> Self {
        self.record.authors = raw
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }

    /// Add a single author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.record.authors.push(author.into());
        self
    }

    /// Set series
    pub fn series(mut self, series: impl Into<String>) -> Self {
        let series = series.into();
        self.record.series = (!series.trim().is_empty()).then(|| series.trim().to_string());
        self
    }

    /// Set language
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.record.language = language.into();
        self
    }

    /// Set file extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.record.extension = extension.into().trim().to_lowercase();
        self
    }

    /// Set size
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.record.size = size.into();
        self
    }

    /// Set content hash
    pub fn content_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.record.content_id = (!id.trim().is_empty()).then(|| id.trim().to_lowercase());
        self
    }

    /// Append a mirror URL, ignoring blanks
    pub fn mirror(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.trim().is_empty() {
            self.record.mirrors.push(url.trim().to_string());
        }
        self
    }

    /// Apply title normalization
    pub fn normalize_title(mut self) -> Self {
        self.record.title = normalize_title(&self.record.title);
        self
    }

    /// Build the Record
    pub fn build(self) -> Record {
        self.record
    }

    /// Build the Record with a trimmed title, or `None` if the title is blank
    pub fn try_build(mut self) -> Option<Record> {
        let title = self.record.title.trim();
        if title.is_empty() {
            return None;
        }
        self.record.title = title.to_string();
        Some(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_strips_isbn() {
        assert_eq!(
            normalize_title("Cloud Cuckoo Land ISBN: 9781982168438"),
            "Cloud Cuckoo Land"
        );
        assert_eq!(normalize_title("Plain Title"), "Plain Title");
    }

    #[test]
    fn test_normalize_title_idempotent() {
        for title in [
            "Cloud Cuckoo Land ISBN: 9781982168438",
            "ISBN: 123",
            "No marker here",
            "Two ISBN: 1 ISBN: 2",
            "",
        ] {
            let once = normalize_title(title);
            assert_eq!(normalize_title(&once), once, "not idempotent for {:?}", title);
        }
    }

    #[test]
    fn test_normalize_title_keeps_marker_only_title() {
        assert_eq!(normalize_title("ISBN: 123"), "ISBN: 123");
    }

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new("Cloud Cuckoo Land", Topic::Fiction)
            .authors_raw("Doerr, Anthony; ")
            .series(" ")
            .language("English")
            .extension("EPUB")
            .size("1 MB")
            .content_id("ABCDEF0123")
            .mirror("http://mirror/one")
            .mirror("")
            .mirror("http://mirror/two")
            .build();

        assert_eq!(record.authors, vec!["Doerr, Anthony"]);
        assert_eq!(record.series, None);
        assert_eq!(record.extension, "epub");
        assert_eq!(record.content_id.as_deref(), Some("abcdef0123"));
        assert_eq!(record.mirrors, vec!["http://mirror/one", "http://mirror/two"]);
    }

    #[test]
    fn test_try_build_requires_title() {
        assert!(RecordBuilder::new("   ", Topic::Fiction).try_build().is_none());
        assert!(RecordBuilder::new("", Topic::SciTech).author("Anon").try_build().is_none());

        let record = RecordBuilder::new("  Cloud Cuckoo Land ", Topic::Fiction)
            .try_build()
            .unwrap();
        assert_eq!(record.title, "Cloud Cuckoo Land");
    }

    #[test]
    fn test_topic_parse_and_display() {
        assert_eq!("fiction".parse::<Topic>().unwrap(), Topic::Fiction);
        assert_eq!("Sci-Tech".parse::<Topic>().unwrap(), Topic::SciTech);
        assert!("poetry".parse::<Topic>().is_err());
        assert_eq!(Topic::SciTech.to_string(), "sci-tech");
        assert_eq!(
            serde_json::to_string(&Topic::SciTech).unwrap(),
            "\"sci-tech\""
        );
    }
}
