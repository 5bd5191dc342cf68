//! Streaming downloads into a staging location.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use super::DownloadError;
use crate::utils::{
    filename_from_content_disposition, filename_from_url, sanitize_filename, unique_path,
    HttpClient,
};

/// Size of the write buffer between the response stream and the file
pub const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of files still being written
pub const PARTIAL_SUFFIX: &str = ".part";

/// How a download ended when no error was raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// File written to `path`
    Success { path: PathBuf, bytes: u64 },
    /// The remote refused or the content did not verify; nothing was kept
    Failure { reason: String },
}

/// Streams a URL to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
}

impl Downloader {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Download `url` to `destination`.
    ///
    /// An existing directory as `destination` gets a file named from the
    /// response (Content-Disposition, then the URL path), made unique within
    /// it. Any other `destination` is used as the file path.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<DownloadOutcome, DownloadError> {
        self.download_checked(url, destination, None).await
    }

    /// Like [`Downloader::download`], and fail when the file's MD5 differs
    /// from `expected_md5`. A mismatching file is removed.
    pub async fn download_checked(
        &self,
        url: &str,
        destination: &Path,
        expected_md5: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::InvalidUrl {
            url: url.to_string(),
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!("Download of {} rejected with {}", url, status);
            return Ok(DownloadOutcome::Failure {
                reason: format!("remote rejected ({})", status.as_u16()),
            });
        }

        let target = if tokio::fs::metadata(destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            let name = response
                .headers()
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename_from_content_disposition)
                .or_else(|| filename_from_url(url))
                .and_then(|name| sanitize_filename(&name))
                .unwrap_or_else(fallback_filename);
            unique_path(destination, &name)
        } else {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DownloadError::io(parent, e))?;
            }
            destination.to_path_buf()
        };

        let partial = partial_path(&target);
        let mut file = File::create(&partial)
            .await
            .map_err(|e| DownloadError::io(&partial, e))?;

        let streamed = stream_to_file(&mut file, response, url, &partial).await;
        drop(file);

        let (bytes, digest) = match streamed {
            Ok(written) => written,
            Err(err) => {
                tracing::warn!("Download of {} failed: {}", url, err);
                remove_quietly(&partial).await;
                return Err(err);
            }
        };

        if let Some(expected) = expected_md5 {
            let actual = format!("{:x}", digest.compute());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                tracing::warn!("Checksum mismatch for {}: expected {}, got {}", url, expected, actual);
                remove_quietly(&partial).await;
                return Ok(DownloadOutcome::Failure {
                    reason: format!("checksum mismatch (expected {}, got {})", expected, actual),
                });
            }
        }

        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|e| DownloadError::io(&target, e))?;

        tracing::info!("Downloaded {} bytes to {}", bytes, target.display());
        Ok(DownloadOutcome::Success {
            path: target,
            bytes,
        })
    }
}

/// Streams the response body to file, returning bytes written and the running digest.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<(u64, md5::Context), DownloadError> {
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut digest = md5::Context::new();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        digest.consume(&chunk);

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok((bytes_written, digest))
}

/// `book.epub` -> `book.epub.part`
pub(crate) fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

fn fallback_filename() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("download-{}", timestamp)
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::debug!("Could not remove {}: {}", path.display(), err);
    }
}
