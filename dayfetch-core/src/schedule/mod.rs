//! Daily scheduler and backlog replay.
//!
//! The scheduler sleeps until the configured time of day, then runs one
//! trigger:
//!
//! 1. skip today if it is not a business day
//! 2. download today's dataset if the archive has published it, otherwise
//!    defer `Single{today}` into the backlog
//! 3. replay the backlog in insertion order
//!
//! A trigger takes the backlog by value and hands back the next one, so the
//! queue only ever lives in the caller. Everything runs on the calling thread;
//! shutdown is a flag checked between operations.

pub mod backlog;
pub mod clock;
pub mod exec_time;

pub use backlog::{Backlog, BacklogEntry};
pub use clock::{Clock, SystemClock};
pub use exec_time::{ExecTime, ExecTimeError};

use crate::calendar::{business_days_between, is_business_day};
use crate::download::{DaySummary, DownloadError, Downloader, RangeSummary};
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// How often the run loop checks the clock and the shutdown flag.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a trigger did about today.
#[derive(Debug)]
pub enum TodayOutcome {
    NotBusinessDay,
    Downloaded(DaySummary),
    /// Not published yet; queued for the next trigger.
    Deferred,
    /// Availability could not be checked or the download failed.
    /// Transport failures are retryable and queue today like a deferral.
    Failed { reason: String, retryable: bool },
}

/// What a trigger did with one backlog entry.
#[derive(Debug)]
pub enum ReplayOutcome {
    Downloaded(DaySummary),
    RangeDownloaded(RangeSummary),
    /// Still unavailable or failed in transport; queued again.
    Requeued,
    /// Failed for good; removed from the backlog.
    Dropped(String),
}

#[derive(Debug)]
pub struct TriggerReport {
    pub today: NaiveDate,
    pub today_outcome: TodayOutcome,
    pub replayed: Vec<(BacklogEntry, ReplayOutcome)>,
}

pub struct Scheduler<'a> {
    downloader: &'a Downloader<'a>,
    exec_at: ExecTime,
}

impl<'a> Scheduler<'a> {
    pub fn new(downloader: &'a Downloader<'a>, exec_at: ExecTime) -> Self {
        Self {
            downloader,
            exec_at,
        }
    }

    pub fn exec_at(&self) -> ExecTime {
        self.exec_at
    }

    /// Run one trigger for `today` against `backlog`, returning the next backlog.
    ///
    /// Only entries present before the trigger are replayed. A deferred today
    /// is appended after them, so the next backlog is at most one entry longer.
    pub fn run_trigger(&self, today: NaiveDate, backlog: Backlog) -> (Backlog, TriggerReport) {
        let mut next = Backlog::new();

        let today_outcome = if !is_business_day(today) {
            info!("No files to download today ({today} is not a business day)");
            TodayOutcome::NotBusinessDay
        } else {
            self.attempt_today(today)
        };

        let mut replayed = Vec::with_capacity(backlog.len());
        for entry in backlog {
            let outcome = self.replay(entry);
            if matches!(outcome, ReplayOutcome::Requeued) {
                next.push(entry);
            }
            replayed.push((entry, outcome));
        }

        if matches!(
            today_outcome,
            TodayOutcome::Deferred | TodayOutcome::Failed { retryable: true, .. }
        ) {
            next.push(BacklogEntry::Single { date: today });
        }

        if !next.is_empty() {
            info!("{} backlog entries pending", next.len());
        }

        (
            next,
            TriggerReport {
                today,
                today_outcome,
                replayed,
            },
        )
    }

    fn attempt_today(&self, today: NaiveDate) -> TodayOutcome {
        match self.downloader.is_data_available(today) {
            Ok(true) => match self.downloader.download_single(today) {
                Ok(summary) => TodayOutcome::Downloaded(summary),
                Err(e) => {
                    error!("Download for {today} failed: {e}");
                    TodayOutcome::Failed {
                        reason: e.to_string(),
                        retryable: e.is_transport(),
                    }
                }
            },
            Ok(false) => {
                warn!("Unable to access files for {today}. Retrying on the next scheduled run.");
                TodayOutcome::Deferred
            }
            Err(e) => {
                error!("Availability check for {today} failed: {e}. Retrying on the next scheduled run.");
                TodayOutcome::Failed {
                    reason: e.to_string(),
                    retryable: true,
                }
            }
        }
    }

    fn replay(&self, entry: BacklogEntry) -> ReplayOutcome {
        match entry {
            BacklogEntry::Single { date } if !is_business_day(date) => {
                // never published, so take the preceding dataset
                self.replay_single_download(date)
            }
            BacklogEntry::Single { date } => match self.downloader.is_data_available(date) {
                Ok(true) => self.replay_single_download(date),
                Ok(false) => {
                    warn!("Unable to access files for {date}. Retrying on the next scheduled run.");
                    ReplayOutcome::Requeued
                }
                Err(e) => {
                    error!("Availability check for {date} failed: {e}");
                    ReplayOutcome::Requeued
                }
            },
            BacklogEntry::Range { start, end } => match self.downloader.download_range(start, end) {
                Ok(summary) => ReplayOutcome::RangeDownloaded(summary),
                Err(e) => self.replay_failure(entry, e),
            },
        }
    }

    fn replay_single_download(&self, date: NaiveDate) -> ReplayOutcome {
        match self.downloader.download_single(date) {
            Ok(summary) => ReplayOutcome::Downloaded(summary),
            Err(e) => self.replay_failure(BacklogEntry::Single { date }, e),
        }
    }

    fn replay_failure(&self, entry: BacklogEntry, e: DownloadError) -> ReplayOutcome {
        if e.is_transport() {
            error!("Backlog entry {entry} failed: {e}. Retrying on the next scheduled run.");
            ReplayOutcome::Requeued
        } else {
            error!("Backlog entry {entry} dropped: {e}");
            ReplayOutcome::Dropped(e.to_string())
        }
    }

    /// Startup work before the loop: download `[start, today]`, or run a
    /// trigger right away when the range is a single business day.
    ///
    /// A business-day `today` missing from the range download is queued.
    pub fn catch_up(&self, start: NaiveDate, today: NaiveDate, backlog: Backlog) -> Backlog {
        if business_days_between(start, today) <= 0 {
            return self.run_trigger(today, backlog).0;
        }

        let mut backlog = backlog;
        match self.downloader.download_range(start, today) {
            Ok(summary) => {
                info!(
                    "Catch-up complete: {} of {} identifiers downloaded",
                    summary.days.len(),
                    summary.total_ids()
                );
                // the range end falls back to an earlier dataset when today's
                // is not out yet; the run loop may not fire again today
                let got_today = summary.days.iter().any(|day| day.resolution.date == today);
                if is_business_day(today) && !got_today {
                    warn!("Unable to access files for {today}. Retrying on the next scheduled run.");
                    backlog.push(BacklogEntry::Single { date: today });
                }
            }
            Err(e) if e.is_transport() => {
                error!("Catch-up from {start} failed: {e}. Retrying on the next scheduled run.");
                backlog.push(BacklogEntry::Range { start, end: today });
            }
            Err(e) => error!("Catch-up from {start} failed: {e}"),
        }
        backlog
    }

    /// The next time the trigger fires, given the last day it fired.
    pub fn next_trigger(&self, now: NaiveDateTime, last_fired: Option<NaiveDate>) -> NaiveDateTime {
        let today = now.date();
        let at_today = today.and_time(self.exec_at.time());
        if last_fired != Some(today) && now <= at_today {
            at_today
        } else {
            (today + ChronoDuration::days(1)).and_time(self.exec_at.time())
        }
    }

    /// Block until `shutdown` is set, firing one trigger per calendar day.
    ///
    /// If the process starts after today's execution time, the first trigger
    /// is tomorrow's. Returns the backlog left at shutdown.
    pub fn run(&self, clock: &dyn Clock, shutdown: &AtomicBool, backlog: Backlog) -> Backlog {
        let mut backlog = backlog;
        let started = clock.now();
        let mut last_fired = (started.time() > self.exec_at.time()).then(|| started.date());

        info!("Running daily job. Scheduled execution time: {}", self.exec_at);
        info!("Next run at {}", self.next_trigger(started, last_fired));

        while !shutdown.load(Ordering::SeqCst) {
            let now = clock.now();
            let today = now.date();

            if last_fired != Some(today) && now.time() >= self.exec_at.time() {
                last_fired = Some(today);
                let (next, _report) = self.run_trigger(today, backlog);
                backlog = next;
                info!("Next run at {}", self.next_trigger(clock.now(), last_fired));
                continue;
            }

            clock.sleep(POLL_INTERVAL);
        }

        info!(
            "Scheduler stopped, {} backlog entries dropped",
            backlog.len()
        );
        backlog
    }
}
