//! File name extraction and sanitization for downloaded books.

use std::path::{Path, PathBuf};

use url::Url;

const MAX_FILENAME_LENGTH: usize = 255;

/// Make a remote file name safe to write locally.
///
/// Path separators and characters that are invalid on common filesystems become
/// `_`. Returns `None` when nothing usable remains or the name is a path
/// traversal attempt.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let filename = filename.trim().replace('\0', "");
    if filename.is_empty() || filename == "." || filename == ".." {
        return None;
    }

    let mut sanitized: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // No hidden files or leading-dot tricks
    while sanitized.starts_with('.') {
        sanitized.remove(0);
    }

    if sanitized.len() > MAX_FILENAME_LENGTH {
        let ext_pos = sanitized.rfind('.').unwrap_or(sanitized.len());
        let ext = sanitized[ext_pos..].to_string();
        let mut base_len = MAX_FILENAME_LENGTH.saturating_sub(ext.len()).min(ext_pos);
        while !sanitized.is_char_boundary(base_len) {
            base_len -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..base_len], ext);
    }

    if sanitized.trim_matches('_').trim().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Parse a Content-Disposition header value for a file name.
///
/// Handles `filename="a.epub"`, `filename=a.epub` and the RFC 5987
/// `filename*=UTF-8''a%20b.epub` form, preferring the latter.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let name = &stripped[..end];
        return (!name.is_empty()).then(|| name.to_string());
    }

    let end = value.find(';').unwrap_or(value.len());
    let name = value[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Last non-empty path segment of a URL, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    (!decoded.is_empty()).then(|| decoded.into_owned())
}

/// Pick a path in `dir` for `filename` that does not exist yet.
///
/// `book.epub` becomes `book_1.epub`, `book_2.epub`, ... on collision.
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base_path = dir.join(filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    for i in 1..1000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("Cloud Cuckoo Land.epub").as_deref(),
            Some("Cloud Cuckoo Land.epub")
        );
        assert_eq!(
            sanitize_filename("a/b\\c:d.epub").as_deref(),
            Some("a_b_c_d.epub")
        );
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("_.._etc_passwd"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("   "), None);
        assert_eq!(sanitize_filename("///"), None);
    }

    #[test]
    fn test_sanitize_filename_truncates_keeping_extension() {
        let long = format!("{}.epub", "x".repeat(400));
        let sanitized = sanitize_filename(&long).unwrap();
        assert_eq!(sanitized.len(), MAX_FILENAME_LENGTH);
        assert!(sanitized.ends_with(".epub"));
    }

    #[test]
    fn test_content_disposition_variants() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"Doerr - Cloud.epub\"")
                .as_deref(),
            Some("Doerr - Cloud.epub")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename=book.epub; size=10").as_deref(),
            Some("book.epub")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=UTF-8''Cloud%20Land.epub")
                .as_deref(),
            Some("Cloud Land.epub")
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://download.example/main/123/abc/Cloud%20Land.epub").as_deref(),
            Some("Cloud Land.epub")
        );
        assert_eq!(
            filename_from_url("https://download.example/dir/").as_deref(),
            Some("dir")
        );
        assert_eq!(filename_from_url("https://download.example/"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "book.epub");
        assert_eq!(first, dir.path().join("book.epub"));

        std::fs::write(&first, b"x").unwrap();
        assert_eq!(unique_path(dir.path(), "book.epub"), dir.path().join("book_1.epub"));
    }
}
