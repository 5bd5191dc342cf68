//! Author/title matching over a candidate set.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::models::Record;

/// How an author filter is compared against author names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorMatch {
    /// An author name contains the filter (case-insensitive)
    #[default]
    Substring,
    /// An author name equals the filter (case-insensitive, trimmed)
    Exact,
}

impl std::str::FromStr for AuthorMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(AuthorMatch::Substring),
            "exact" => Ok(AuthorMatch::Exact),
            other => Err(format!("unknown author policy: {}", other)),
        }
    }
}

/// Narrows records by author and title.
///
/// Filtering keeps input order and never touches the input slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    policy: AuthorMatch,
}

impl MatchEngine {
    pub fn new(policy: AuthorMatch) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AuthorMatch {
        self.policy
    }

    /// Keep records passing both the author and the title predicate.
    ///
    /// `author` must be `First Last`; it also matches the `Last, First` form.
    /// `title` is a case-insensitive regex, or a literal when it does not
    /// compile. Blank filters are treated as absent.
    pub fn filter(
        &self,
        records: &[Record],
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<Record>, PipelineError> {
        let forms = author
            .filter(|a| !a.trim().is_empty())
            .map(author_forms)
            .transpose()?;
        let pattern = title
            .filter(|t| !t.trim().is_empty())
            .map(title_pattern)
            .transpose()?;

        Ok(records
            .iter()
            .filter(|record| {
                let author_ok = forms
                    .as_ref()
                    .map_or(true, |forms| self.author_matches(record, forms));
                let title_ok = pattern
                    .as_ref()
                    .map_or(true, |re| re.is_match(&record.title));
                author_ok && title_ok
            })
            .cloned()
            .collect())
    }

    fn author_matches(&self, record: &Record, forms: &[String; 2]) -> bool {
        record.authors.iter().any(|name| {
            let name = name.trim().to_lowercase();
            forms.iter().any(|form| match self.policy {
                AuthorMatch::Substring => name.contains(form.as_str()),
                AuthorMatch::Exact => name == *form,
            })
        })
    }
}

/// Lower-cased `first last` and `last, first`
fn author_forms(author: &str) -> Result<[String; 2], PipelineError> {
    let tokens: Vec<&str> = author.split_whitespace().collect();
    match tokens.as_slice() {
        [first, last] => {
            let (first, last) = (first.to_lowercase(), last.to_lowercase());
            Ok([format!("{} {}", first, last), format!("{}, {}", last, first)])
        }
        _ => Err(PipelineError::Validation(format!(
            "author must be given as 'First Last', got '{}'",
            author.trim()
        ))),
    }
}

fn title_pattern(title: &str) -> Result<Regex, PipelineError> {
    let title = title.trim();
    RegexBuilder::new(title)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            tracing::debug!("Title filter '{}' is not a valid regex, matching literally", title);
            RegexBuilder::new(&regex::escape(title))
                .case_insensitive(true)
                .build()
        })
        .map_err(|e| PipelineError::Validation(format!("title filter: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, Topic};

    fn record(title: &str, authors: &str) -> Record {
        RecordBuilder::new(title, Topic::Fiction)
            .authors_raw(authors)
            .build()
    }

    fn sample() -> Vec<Record> {
        vec![
            record("Cloud Cuckoo Land", "Anthony Doerr"),
            record("All the Light We Cannot See", "Doerr, Anthony"),
            record("The Shell Collector", "Jane Doe"),
            record("Doe Stories", "Doe, Jane; John Smith"),
            record("Anonymous", ""),
        ]
    }

    #[test]
    fn test_no_filters_returns_input() {
        let records = sample();
        let matched = MatchEngine::default().filter(&records, None, None).unwrap();
        assert_eq!(matched, records);
    }

    #[test]
    fn test_author_matches_both_name_orders() {
        let records = sample();
        let matched = MatchEngine::default()
            .filter(&records, Some("Anthony Doerr"), None)
            .unwrap();
        let titles: Vec<_> = matched.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Cloud Cuckoo Land", "All the Light We Cannot See"]);
    }

    #[test]
    fn test_author_rejects_other_first_name() {
        let records = vec![
            record("A", "Jane Doe"),
            record("B", "Doe, Jane"),
            record("C", "John Doe"),
        ];
        let matched = MatchEngine::default()
            .filter(&records, Some("jane doe"), None)
            .unwrap();
        let titles: Vec<_> = matched.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_exact_policy() {
        let records = vec![
            record("A", "Jane Doe"),
            record("B", "Jane Doe-Smith"),
            record("C", " doe, jane "),
        ];

        let substring = MatchEngine::new(AuthorMatch::Substring)
            .filter(&records, Some("Jane Doe"), None)
            .unwrap();
        assert_eq!(substring.len(), 3);

        let exact = MatchEngine::new(AuthorMatch::Exact)
            .filter(&records, Some("Jane Doe"), None)
            .unwrap();
        let titles: Vec<_> = exact.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn test_author_needs_two_tokens() {
        let records = sample();
        let engine = MatchEngine::default();
        for bad in ["Doerr", "Anthony M. Doerr", "Le Guin Ursula"] {
            let result = engine.filter(&records, Some(bad), None);
            assert!(matches!(result, Err(PipelineError::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn test_records_without_authors_fail_author_filter() {
        let records = vec![record("Anonymous", "")];
        let matched = MatchEngine::default()
            .filter(&records, Some("Jane Doe"), None)
            .unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_title_regex_and_literal_fallback() {
        let records = vec![
            record("Cloud Cuckoo Land", "Anthony Doerr"),
            record("C++ Primer (5th ed)", "Stanley Lippman"),
        ];
        let engine = MatchEngine::default();

        let matched = engine.filter(&records, None, Some("^cloud.*land$")).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Cloud Cuckoo Land");

        // Unbalanced parenthesis is not a valid regex; matched as text instead
        let matched = engine.filter(&records, None, Some("primer (5th")).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "C++ Primer (5th ed)");
    }

    #[test]
    fn test_both_predicates_must_pass() {
        let records = sample();
        let matched = MatchEngine::default()
            .filter(&records, Some("Anthony Doerr"), Some("cuckoo"))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Cloud Cuckoo Land");
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let records = sample();
        let matched = MatchEngine::default()
            .filter(&records, Some("  "), Some(""))
            .unwrap();
        assert_eq!(matched.len(), records.len());
    }

    #[test]
    fn test_author_policy_parsing() {
        assert_eq!("exact".parse::<AuthorMatch>().unwrap(), AuthorMatch::Exact);
        assert_eq!(" Substring ".parse::<AuthorMatch>().unwrap(), AuthorMatch::Substring);
        assert!("fuzzy".parse::<AuthorMatch>().is_err());
    }
}
