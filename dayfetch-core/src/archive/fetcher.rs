//! Resource fetcher trait and transport error types.
//!
//! The ResourceFetcher trait abstracts over the archive so the resolver and
//! the downloader can be driven by an in-memory archive in tests.

use crate::domain::ResourceId;
use chrono::NaiveDate;
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Transport-level failures. Unavailability is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("hard stop: archive has blocked requests (circuit breaker open, {remaining_secs}s left)")]
    CircuitBreakerOpen { remaining_secs: u64 },

    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),

    #[error("fetch error: {0}")]
    Other(String),
}

/// One artifact as served by the archive.
///
/// The body is read lazily, so callers that only need the metadata (the
/// resolver's probes, or a skip because the file already exists) never pull
/// the payload.
pub struct ArtifactStream {
    /// File name from the response metadata.
    pub file_name: String,
    /// Date embedded in the file name, if any.
    pub reported_date: Option<NaiveDate>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("file_name", &self.file_name)
            .field("reported_date", &self.reported_date)
            .finish_non_exhaustive()
    }
}

pub trait ResourceFetcher: Send + Sync {
    /// Human-readable name of this fetcher.
    fn name(&self) -> &str;

    /// Fetch one artifact of one identifier.
    ///
    /// `Ok(None)` means the archive returned no metadata for it: the
    /// identifier is unpublished.
    fn fetch(&self, id: ResourceId, artifact: &str) -> Result<Option<ArtifactStream>, FetchError>;

    /// The date the archive reports for `id`, read from `probe_artifact`'s metadata.
    fn reported_date(
        &self,
        id: ResourceId,
        probe_artifact: &str,
    ) -> Result<Option<NaiveDate>, FetchError> {
        Ok(self
            .fetch(id, probe_artifact)?
            .and_then(|artifact| artifact.reported_date))
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// Handles `attachment; filename=TC_20240103.txt` and the quoted form.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let raw = rest.split(';').next()?.trim().trim_matches('"');
    // never trust a server-supplied path
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// First run of exactly eight digits in `file_name` that is a valid `YYYYMMDD` date.
pub fn date_from_filename(file_name: &str) -> Option<NaiveDate> {
    let bytes = file_name.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end - start == 8 {
            if let Ok(date) = NaiveDate::parse_from_str(&file_name[start..end], "%Y%m%d") {
                return Some(date);
            }
        }
        start = end;
    }
    None
}
