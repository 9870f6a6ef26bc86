//! dayfetch core: date/identifier reconciliation and daily artifact downloads.
//!
//! The remote archive files each business day's dataset under an opaque,
//! increasing identifier. This crate contains:
//! - Business-day arithmetic and the anchor-based identifier estimate
//! - The resolver (estimate, probe, correct) and its walk-back fallback
//! - The resource fetcher trait and its HTTP implementation
//! - The download orchestrator with skip-if-exists semantics
//! - The daily scheduler with its in-memory backlog

pub mod archive;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod download;
pub mod resolve;
pub mod schedule;

pub use archive::{ArtifactStream, CircuitBreaker, FetchError, HttpFetcher, ResourceFetcher};
pub use config::{AppConfig, ConfigError};
pub use domain::{ArtifactOutcome, ReferenceAnchor, Resolution, ResolutionOutcome, ResourceId};
pub use download::{
    DaySummary, DownloadError, DownloadProgress, Downloader, LogProgress, RangeSummary,
};
pub use resolve::Resolver;
pub use schedule::{Backlog, BacklogEntry, ExecTime, Scheduler, SystemClock, TriggerReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn fetchers_are_send_sync() {
        assert_send::<HttpFetcher>();
        assert_sync::<HttpFetcher>();
        assert_send::<CircuitBreaker>();
        assert_sync::<CircuitBreaker>();
    }

    #[test]
    fn backlog_is_send() {
        assert_send::<Backlog>();
        assert_send::<BacklogEntry>();
    }
}
