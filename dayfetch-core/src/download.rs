//! Download orchestrator: resolved identifiers -> artifact files on disk.
//!
//! Layout: `{output_dir}/{YYYY-MM-DD}/{file name from the archive}`
//!
//! - One directory per resolved dataset date
//! - Existing files are never overwritten (`AlreadyExists`, zero bytes written)
//! - Writes go to a `.tmp` sibling and are renamed into place
//! - A failed artifact never stops the remaining artifacts of the day, and a
//!   failed day never stops the remaining days of a range

use crate::archive::{FetchError, ResourceFetcher};
use crate::domain::{ArtifactOutcome, Resolution, ResolutionOutcome, ResourceId};
use crate::resolve::Resolver;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{date} is before the earliest available date {earliest}")]
    OutOfRange { date: NaiveDate, earliest: NaiveDate },

    #[error("no dataset found for {date}")]
    NotFound { date: NaiveDate },

    #[error("resolution diverged for {date}: the anchor and the archive disagree")]
    Divergent { date: NaiveDate },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("archive returned no metadata for {artifact} of identifier {id}")]
    MissingMetadata { artifact: String, id: ResourceId },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

impl DownloadError {
    /// Transport failures are worth retrying on the next trigger.
    pub fn is_transport(&self) -> bool {
        matches!(self, DownloadError::Fetch(_))
    }
}

/// Per-artifact outcomes of one dataset.
#[derive(Debug, Clone)]
pub struct DaySummary {
    /// Date the caller asked for.
    pub requested: NaiveDate,
    /// Dataset actually downloaded (earlier than `requested` after a fallback).
    pub resolution: Resolution,
    pub outcomes: Vec<(String, ArtifactOutcome)>,
}

impl DaySummary {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::AlreadyExists))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::TransportError(_)))
    }

    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                ArtifactOutcome::Downloaded { bytes } => *bytes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&ArtifactOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Outcome of a range download.
#[derive(Debug, Clone)]
pub struct RangeSummary {
    pub start_id: ResourceId,
    pub end_id: ResourceId,
    pub days: Vec<DaySummary>,
    /// Identifiers inside the range that reported no date. No artifact of
    /// these is requested: without a date there is no output directory.
    pub unavailable: Vec<ResourceId>,
    /// Identifiers whose date lookup failed in transport.
    pub failed: Vec<(ResourceId, String)>,
}

impl RangeSummary {
    pub fn total_ids(&self) -> usize {
        (self.end_id.0 - self.start_id.0 + 1) as usize
    }

    pub fn all_succeeded(&self) -> bool {
        self.unavailable.is_empty()
            && self.failed.is_empty()
            && self.days.iter().all(|day| day.failed() == 0)
    }
}

/// Progress callbacks for day and range downloads.
pub trait DownloadProgress: Send + Sync {
    fn on_day_start(&self, requested: NaiveDate, resolution: &Resolution);

    fn on_artifact(&self, artifact: &str, index: usize, total: usize, outcome: &ArtifactOutcome);

    fn on_day_complete(&self, summary: &DaySummary);

    /// Called after each identifier of a range, `position` is 1-based.
    fn on_range_progress(&self, position: usize, total: usize, date: Option<NaiveDate>);
}

/// Reports progress through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_day_start(&self, requested: NaiveDate, resolution: &Resolution) {
        if requested == resolution.date {
            info!("Preparing to download data from {requested} (id {})...", resolution.id);
        } else {
            info!(
                "No dataset for {requested}, using {} (id {}) instead...",
                resolution.date, resolution.id
            );
        }
    }

    fn on_artifact(&self, artifact: &str, index: usize, total: usize, outcome: &ArtifactOutcome) {
        match outcome {
            ArtifactOutcome::Downloaded { bytes } => {
                info!("Downloaded {artifact} ({}/{total}, {bytes} bytes)", index + 1)
            }
            ArtifactOutcome::AlreadyExists => {
                info!("Skipped {artifact} ({}/{total}): already exists", index + 1)
            }
            ArtifactOutcome::TransportError(detail) => {
                error!("Failed {artifact} ({}/{total}): {detail}", index + 1)
            }
        }
    }

    fn on_day_complete(&self, summary: &DaySummary) {
        info!(
            "Export complete for {}: {} downloaded, {} skipped, {} failed",
            summary.resolution.date,
            summary.downloaded(),
            summary.skipped(),
            summary.failed()
        );
    }

    fn on_range_progress(&self, position: usize, total: usize, date: Option<NaiveDate>) {
        match date {
            Some(date) => info!("Processed data from {date} ({position}/{total})"),
            None => warn!("Identifier {position}/{total} has no dataset"),
        }
    }
}

pub struct Downloader<'a> {
    resolver: Resolver<'a>,
    artifacts: &'a [String],
    output_dir: PathBuf,
    progress: &'a dyn DownloadProgress,
}

impl<'a> Downloader<'a> {
    pub fn new(
        resolver: Resolver<'a>,
        artifacts: &'a [String],
        output_dir: impl Into<PathBuf>,
        progress: &'a dyn DownloadProgress,
    ) -> Self {
        Self {
            resolver,
            artifacts,
            output_dir: output_dir.into(),
            progress,
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory for one dataset: `{output_dir}/{YYYY-MM-DD}/`
    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(date.format("%Y-%m-%d").to_string())
    }

    pub fn is_data_available(&self, date: NaiveDate) -> Result<bool, FetchError> {
        self.resolver.is_data_available(date)
    }

    /// Relative-resolve `date` or explain why not.
    pub fn resolve_to(&self, date: NaiveDate) -> Result<Resolution, DownloadError> {
        match self.resolver.resolve_relative(date)? {
            ResolutionOutcome::Resolved(resolution) => Ok(resolution),
            ResolutionOutcome::NotFound => Err(DownloadError::NotFound { date }),
            ResolutionOutcome::OutOfRange => Err(DownloadError::OutOfRange {
                date,
                earliest: self.resolver.anchor().earliest_date,
            }),
            ResolutionOutcome::Divergent => Err(DownloadError::Divergent { date }),
        }
    }

    /// Download every artifact of the dataset for `date`, or of the nearest
    /// earlier date that has one.
    pub fn download_single(&self, date: NaiveDate) -> Result<DaySummary, DownloadError> {
        let resolution = self.resolve_to(date)?;
        Ok(self.download_day(date, resolution))
    }

    /// Download every dataset whose identifier lies between the resolved ends.
    pub fn download_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeSummary, DownloadError> {
        if start > end {
            return Err(DownloadError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }

        let first = self.resolve_to(start)?;
        let last = self.resolve_to(end)?;
        if first.id > last.id {
            return Err(DownloadError::InvalidRange(format!(
                "identifier {} for {start} is after identifier {} for {end}",
                first.id, last.id
            )));
        }

        info!("Preparing to download data from {start} to {end}...");

        let mut summary = RangeSummary {
            start_id: first.id,
            end_id: last.id,
            days: Vec::new(),
            unavailable: Vec::new(),
            failed: Vec::new(),
        };
        let total = summary.total_ids();

        for (offset, raw) in (first.id.0..=last.id.0).enumerate() {
            let id = ResourceId(raw);
            let date = match self.resolver.probe(id) {
                Ok(date) => date,
                Err(e) => {
                    error!("Failed to look up identifier {id}: {e}");
                    summary.failed.push((id, e.to_string()));
                    self.progress.on_range_progress(offset + 1, total, None);
                    continue;
                }
            };

            match date {
                Some(date) => {
                    let day = self.download_day(date, Resolution { id, date });
                    summary.days.push(day);
                }
                None => summary.unavailable.push(id),
            }
            self.progress.on_range_progress(offset + 1, total, date);
        }

        info!(
            "Range complete: {} days, {} unavailable, {} failed lookups",
            summary.days.len(),
            summary.unavailable.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Fetch all configured artifacts for an already resolved dataset.
    pub fn download_day(&self, requested: NaiveDate, resolution: Resolution) -> DaySummary {
        self.progress.on_day_start(requested, &resolution);

        let dir = self.day_dir(resolution.date);
        let total = self.artifacts.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, artifact) in self.artifacts.iter().enumerate() {
            let outcome = match self.fetch_artifact(resolution.id, artifact, &dir) {
                Ok(outcome) => outcome,
                Err(e) => ArtifactOutcome::TransportError(e.to_string()),
            };
            self.progress.on_artifact(artifact, index, total, &outcome);
            outcomes.push((artifact.clone(), outcome));
        }

        let summary = DaySummary {
            requested,
            resolution,
            outcomes,
        };
        self.progress.on_day_complete(&summary);
        summary
    }

    fn fetch_artifact(
        &self,
        id: ResourceId,
        artifact: &str,
        dir: &Path,
    ) -> Result<ArtifactOutcome, DownloadError> {
        let fetcher: &dyn ResourceFetcher = self.resolver.fetcher();
        let mut stream = fetcher
            .fetch(id, artifact)?
            .ok_or_else(|| DownloadError::MissingMetadata {
                artifact: artifact.to_string(),
                id,
            })?;

        let path = dir.join(&stream.file_name);
        if path.exists() {
            return Ok(ArtifactOutcome::AlreadyExists);
        }

        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!("{}.tmp", stream.file_name));
        let written = write_file(&tmp_path, &mut stream.body).and_then(|bytes| {
            fs::rename(&tmp_path, &path)?;
            Ok(bytes)
        });

        match written {
            Ok(bytes) => Ok(ArtifactOutcome::Downloaded { bytes }),
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e.into())
            }
        }
    }
}

fn write_file(path: &Path, body: &mut dyn io::Read) -> io::Result<u64> {
    let mut file = fs::File::create(path)?;
    let bytes = io::copy(body, &mut file)?;
    file.sync_all()?;
    Ok(bytes)
}
