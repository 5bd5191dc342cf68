//! Library Genesis book index.
//!
//! Library Genesis has no public API, so both catalogues are scraped:
//!
//! - fiction: `<fiction_url>?q=...&language=...&format=...`, rows of `table.catalog`
//! - sci-tech: `<scitech_url>?req=...`, rows of `table.c`
//!
//! Download links for a content hash come from the mirror-metadata page at
//! `<mirror_url>/<fiction|main>/<md5>`, read from the `#download` block in
//! document order.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::models::{RawEntry, SearchQuery, SearchResponse, Topic};
use crate::sources::{Source, SourceError, Timeouts};
use crate::utils::HttpClient;

/// Default fiction catalogue
pub const LIBGEN_FICTION_URL: &str = "https://libgen.is/fiction/";
/// Default sci-tech catalogue
pub const LIBGEN_SCITECH_URL: &str = "https://libgen.is/search.php";
/// Default mirror-metadata host
pub const LIBGEN_MIRROR_URL: &str = "https://library.lol";

/// Library Genesis source
#[derive(Debug, Clone)]
pub struct LibgenSource {
    client: Arc<HttpClient>,
    fiction_url: String,
    scitech_url: String,
    mirror_url: String,
}

impl LibgenSource {
    /// Create a source against the public Library Genesis hosts
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    /// Create a source from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = HttpClient::with_timeouts(
            config.mirrors.connect_timeout(),
            config.search.timeout(),
        )?;
        Ok(Self::with_client(Arc::new(client))
            .fiction_url(&config.search.fiction_url)
            .scitech_url(&config.search.scitech_url)
            .mirror_url(&config.mirrors.base_url))
    }

    /// Create with a custom HTTP client (for testing)
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            fiction_url: LIBGEN_FICTION_URL.to_string(),
            scitech_url: LIBGEN_SCITECH_URL.to_string(),
            mirror_url: LIBGEN_MIRROR_URL.to_string(),
        }
    }

    /// Override the fiction catalogue URL
    pub fn fiction_url(mut self, url: impl Into<String>) -> Self {
        self.fiction_url = url.into();
        self
    }

    /// Override the sci-tech catalogue URL
    pub fn scitech_url(mut self, url: impl Into<String>) -> Self {
        self.scitech_url = url.into();
        self
    }

    /// Override the mirror-metadata host
    pub fn mirror_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_url = url.into();
        self
    }

    /// Build the catalogue URL for a query
    fn search_url(&self, query: &SearchQuery) -> String {
        let q = urlencoding::encode(query.query.trim());
        match query.topic {
            Topic::Fiction => format!(
                "{}?q={}&criteria=&language={}&format={}",
                self.fiction_url,
                q,
                urlencoding::encode(query.language.as_deref().unwrap_or_default()),
                urlencoding::encode(query.format.as_deref().unwrap_or_default()),
            ),
            Topic::SciTech => format!(
                "{}?req={}&lg_topic=libgen&open=0&view=simple&res=100&phrase=1&column=def",
                self.scitech_url, q
            ),
        }
    }

    /// Build the mirror-metadata page URL for a content hash
    fn mirror_page_url(&self, content_id: &str, topic: Topic) -> String {
        format!(
            "{}/{}/{}",
            self.mirror_url.trim_end_matches('/'),
            topic.mirror_path(),
            content_id.trim().to_uppercase()
        )
    }

    async fn fetch_html(&self, url: &str, timeouts: Option<Timeouts>) -> Result<String, SourceError> {
        let mut request = self.client.get(url).header("Accept", "text/html");
        if let Some(timeouts) = timeouts {
            request = request.timeout(timeouts.total());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(format!("{} returned 404", url)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!("{} returned status: {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))
    }
}

#[async_trait]
impl Source for LibgenSource {
    fn id(&self) -> &str {
        "libgen"
    }

    fn name(&self) -> &str {
        "Library Genesis"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        if query.query.trim().is_empty() {
            return Err(SourceError::InvalidRequest("Empty query".to_string()));
        }

        let url = self.search_url(query);
        tracing::debug!("Searching {} catalogue: {}", query.topic, url);

        let html = self.fetch_html(&url, None).await?;
        let entries = match query.topic {
            Topic::Fiction => parse_fiction_page(&html)?,
            Topic::SciTech => parse_scitech_page(&html)?,
        };

        let entries = entries
            .into_iter()
            .filter(|e| matches_filter(&e.language, query.language.as_deref()))
            .filter(|e| matches_filter(&e.extension, query.format.as_deref()))
            .collect();

        Ok(SearchResponse::new(entries, self.name(), &query.query))
    }

    async fn mirror_links(
        &self,
        content_id: &str,
        topic: Topic,
        timeouts: Timeouts,
    ) -> Result<Vec<String>, SourceError> {
        if content_id.trim().is_empty() {
            return Err(SourceError::InvalidRequest("Empty content id".to_string()));
        }

        let url = self.mirror_page_url(content_id, topic);
        let html = self.fetch_html(&url, Some(timeouts)).await?;
        let links = parse_mirror_page(&html, &url)?;

        if links.is_empty() {
            return Err(SourceError::NotFound(format!(
                "No download links for {}",
                content_id
            )));
        }
        Ok(links)
    }
}

fn matches_filter(value: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim) {
        Some(wanted) if !wanted.is_empty() => value.trim().eq_ignore_ascii_case(wanted),
        _ => true,
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("invalid selector {}: {:?}", css, e)))
}

/// Collapse all text inside an element into single-spaced words
fn clean_text(elem: &ElementRef) -> String {
    elem.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Direct `<td>` children of a row
fn cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .collect()
}

/// Pull a 32-character MD5 out of a link
fn extract_md5(href: &str) -> Option<String> {
    let re = regex::Regex::new(r"(?i)\b([0-9a-f]{32})\b").ok()?;
    re.captures(href)?.get(1).map(|m| m.as_str().to_lowercase())
}

fn link_hrefs(elem: &ElementRef, links: &Selector) -> Vec<String> {
    elem.select(links)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

/// Parse the fiction catalogue results table
pub(crate) fn parse_fiction_page(html: &str) -> Result<Vec<RawEntry>, SourceError> {
    let document = Html::parse_document(html);
    let rows = selector("table.catalog tbody tr")?;
    let authors = selector("li")?;
    let links = selector("a[href]")?;

    let mut entries = Vec::new();
    for row in document.select(&rows) {
        let cells = cells(&row);
        if cells.len() < 6 {
            continue;
        }

        let author_names: Vec<String> = cells[0]
            .select(&authors)
            .map(|li| clean_text(&li))
            .filter(|s| !s.is_empty())
            .collect();
        let author_field = if author_names.is_empty() {
            clean_text(&cells[0])
        } else {
            author_names.join("; ")
        };

        let title_links = link_hrefs(&cells[2], &links);
        let mirrors = link_hrefs(&cells[5], &links);
        let md5 = title_links
            .iter()
            .chain(mirrors.iter())
            .find_map(|href| extract_md5(href))
            .unwrap_or_default();

        let file = clean_text(&cells[4]);
        let (extension, size) = file
            .split_once('/')
            .map(|(ext, size)| (ext.trim().to_lowercase(), size.trim().to_string()))
            .unwrap_or_default();

        let series = clean_text(&cells[1]);
        entries.push(RawEntry {
            id: md5.clone(),
            authors: (!author_field.is_empty()).then_some(author_field),
            series: (!series.is_empty()).then_some(series),
            title: clean_text(&cells[2]),
            language: clean_text(&cells[3]),
            file,
            mirror1: mirrors.first().cloned().unwrap_or_default(),
            mirror2: mirrors.get(1).cloned().unwrap_or_default(),
            md5,
            topic: Topic::Fiction.id().to_string(),
            extension,
            size,
        });
    }

    Ok(entries)
}

/// Parse the sci-tech catalogue results table
pub(crate) fn parse_scitech_page(html: &str) -> Result<Vec<RawEntry>, SourceError> {
    let document = Html::parse_document(html);
    let rows = selector("table.c tr")?;
    let anchors = selector("a")?;
    let title_link = selector("a[href*='md5=']")?;
    let series_link = selector("a[href*='column=series']")?;
    let links = selector("a[href]")?;

    let mut entries = Vec::new();
    for row in document.select(&rows) {
        let cells = cells(&row);
        if cells.len() < 11 {
            continue;
        }

        // Header row has "ID" instead of a numeric id
        let id = clean_text(&cells[0]);
        if id.parse::<u64>().is_err() {
            continue;
        }

        let Some(title_anchor) = cells[2].select(&title_link).next() else {
            continue;
        };
        let title = title_anchor
            .children()
            .filter_map(|node| node.value().as_text())
            .flat_map(|text| text.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");
        let md5 = title_anchor
            .value()
            .attr("href")
            .and_then(extract_md5)
            .unwrap_or_default();

        let author_names: Vec<String> = cells[1]
            .select(&anchors)
            .map(|a| clean_text(&a))
            .filter(|s| !s.is_empty())
            .collect();
        let author_field = if author_names.is_empty() {
            clean_text(&cells[1])
        } else {
            author_names.join("; ")
        };

        let series = cells[2]
            .select(&series_link)
            .next()
            .map(|a| clean_text(&a))
            .filter(|s| !s.is_empty());

        let extension = clean_text(&cells[8]).to_lowercase();
        let size = clean_text(&cells[7]);
        entries.push(RawEntry {
            id,
            authors: (!author_field.is_empty()).then_some(author_field),
            series,
            title,
            language: clean_text(&cells[6]),
            file: format!("{} / {}", extension.to_uppercase(), size),
            mirror1: link_hrefs(&cells[9], &links).into_iter().next().unwrap_or_default(),
            mirror2: link_hrefs(&cells[10], &links).into_iter().next().unwrap_or_default(),
            md5,
            topic: Topic::SciTech.id().to_string(),
            extension,
            size,
        });
    }

    Ok(entries)
}

/// Parse the download links of a mirror-metadata page, in document order
pub(crate) fn parse_mirror_page(html: &str, page_url: &str) -> Result<Vec<String>, SourceError> {
    let document = Html::parse_document(html);
    let links = selector("#download a[href]")?;
    let base = Url::parse(page_url).ok();

    let mut urls: Vec<String> = Vec::new();
    for href in document.select(&links).filter_map(|a| a.value().attr("href")) {
        let resolved = match &base {
            Some(base) => base.join(href.trim()).ok(),
            None => Url::parse(href.trim()).ok(),
        };
        let Some(resolved) = resolved else { continue };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let resolved = resolved.to_string();
        if !urls.contains(&resolved) {
            urls.push(resolved);
        }
    }

    Ok(urls)
}
