//! Terminal output for the command-line front end.
//!
//! Record tables, plain listings and a spinner for long-running fetches.

use std::io::IsTerminal;
use std::time::Duration;

use comfy_table::{Attribute, Cell, Table};

use crate::models::Record;
use crate::pipeline::ProbeStatus;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Truncate to `max_chars` characters, ending in `...` when shortened.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let head: String = s.chars().take(keep).collect();
    format!("{}...", head)
}

/// Records as a table, numbered by row index.
pub fn records_table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Title", "Authors", "Series", "Lang", "Format", "Size"]);

    for (index, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index),
            Cell::new(truncate_with_ellipsis(&record.title, 50)).add_attribute(Attribute::Bold),
            Cell::new(truncate_with_ellipsis(&record.authors_display(), 30)),
            Cell::new(record.series.as_deref().unwrap_or_default()),
            Cell::new(&record.language),
            Cell::new(&record.extension),
            Cell::new(&record.size),
        ]);
    }
    table
}

/// Records as plain text, one block per record.
pub fn records_plain(records: &[Record]) -> String {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        out.push_str(&format!("[{}] {} - {}\n", index, record.title, record.authors_display()));
        out.push_str(&format!(
            "  {} | {} | {} | {}\n",
            record.topic, record.language, record.extension, record.size
        ));
        if let Some(ref content_id) = record.content_id {
            out.push_str(&format!("  MD5: {}\n", content_id));
        }
        for mirror in &record.mirrors {
            out.push_str(&format!("  Mirror: {}\n", mirror));
        }
        out.push('\n');
    }
    out
}

/// Mirror URLs with optional probe results as a table.
pub fn mirrors_table(mirrors: &[(String, Option<ProbeStatus>)]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "URL", "Status"]);
    for (index, (url, status)) in mirrors.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index),
            Cell::new(url),
            Cell::new(status.as_ref().map(|s| s.to_string()).unwrap_or_default()),
        ]);
    }
    table
}

/// Print a loading spinner with message.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// A spinner that draws nothing, for quiet or non-terminal output.
    pub fn hidden() -> Self {
        Self {
            pb: indicatif::ProgressBar::hidden(),
        }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    /// Clear the spinner line.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, Topic};

    fn sample() -> Vec<Record> {
        vec![RecordBuilder::new("Cloud Cuckoo Land", Topic::Fiction)
            .author("Anthony Doerr")
            .language("English")
            .extension("EPUB")
            .size("1.8 MB")
            .content_id("ABC")
            .mirror("http://library.lol/fiction/ABC")
            .build()]
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Hello", 10), "Hello");
        assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
        assert_eq!(truncate_with_ellipsis("Hello", 3), "...");
        assert_eq!(truncate_with_ellipsis("Écrire un livre", 9), "Écrire...");
    }

    #[test]
    fn test_records_table() {
        let rendered = records_table(&sample()).to_string();
        assert!(rendered.contains("Cloud Cuckoo Land"));
        assert!(rendered.contains("Anthony Doerr"));
        assert!(rendered.contains("epub"));
    }

    #[test]
    fn test_records_plain() {
        let plain = records_plain(&sample());
        assert!(plain.starts_with("[0] Cloud Cuckoo Land - Anthony Doerr\n"));
        assert!(plain.contains("  MD5: abc\n"));
        assert!(plain.contains("  Mirror: http://library.lol/fiction/ABC\n"));
    }

    #[test]
    fn test_mirrors_table() {
        let rendered = mirrors_table(&[
            ("http://a/1".to_string(), Some(ProbeStatus::Available)),
            ("http://b/2".to_string(), None),
        ])
        .to_string();
        assert!(rendered.contains("http://a/1"));
        assert!(rendered.contains("available"));
    }
}
