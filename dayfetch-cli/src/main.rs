//! dayfetch CLI: one-off downloads and the daily scheduler.
//!
//! Commands:
//! - `download`: fetch one date, today, or a date range into the output directory
//! - `schedule`: catch up from a start date, then download every business day
//!   at a fixed time until interrupted

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dayfetch_core::calendar::{business_days_between, parse_date};
use dayfetch_core::schedule::{Backlog, ExecTime, Scheduler, SystemClock};
use dayfetch_core::{
    AppConfig, CircuitBreaker, DaySummary, Downloader, HttpFetcher, LogProgress, RangeSummary,
    Resolver,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Ranges at least this many business days long ask before downloading.
const LARGE_RANGE_DAYS: i64 = 100;

const LOG_TIME_FORMAT: &str = "%d-%b-%y %H:%M:%S";

#[derive(Parser)]
#[command(
    name = "dayfetch",
    about = "dayfetch: daily archive downloader"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Append log output to this file instead of stdout.
    #[arg(short = 'o', long, global = true)]
    log_file: Option<PathBuf>,

    /// Log filter (e.g. info, debug, dayfetch_core=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the files of one date, today, or a date range.
    Download {
        /// Download a single date (YYYY-MM-DD or YYYYMMDD).
        #[arg(long)]
        on_date: Option<String>,

        /// Download today's files.
        #[arg(long, default_value_t = false)]
        today: bool,

        /// Range start. Defaults to the earliest available date.
        #[arg(long)]
        start_date: Option<String>,

        /// Range end. Defaults to today.
        #[arg(long)]
        end_date: Option<String>,

        /// Skip the confirmation prompt for large ranges.
        #[arg(long, default_value_t = false)]
        yes: bool,

        /// Output directory. Defaults to the config's output.dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Download from a start date up to today, then every business day at a fixed time.
    Schedule {
        /// Catch-up start date. Defaults to today.
        #[arg(long)]
        start_date: Option<String>,

        /// Daily execution time (HH:MM, 24-hour).
        #[arg(long, default_value = "17:00")]
        exec_at: ExecTime,

        /// Output directory. Defaults to the config's output.dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_file.as_deref())?;

    let config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Download {
            on_date,
            today,
            start_date,
            end_date,
            yes,
            output_dir,
        } => run_download(
            &config,
            DownloadRequest::from_args(&config, on_date, today, start_date, end_date)?,
            yes,
            output_dir,
        ),
        Commands::Schedule {
            start_date,
            exec_at,
            output_dir,
        } => run_schedule(&config, start_date, exec_at, output_dir),
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let timer = ChronoLocal::new(LOG_TIME_FORMAT.to_string());

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(timer)
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(timer))
            .init();
    }
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// What a `download` invocation asks for, validated against the anchor.
#[derive(Debug, PartialEq, Eq)]
enum DownloadRequest {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

impl DownloadRequest {
    fn from_args(
        config: &AppConfig,
        on_date: Option<String>,
        use_today: bool,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<Self> {
        let earliest = config.anchor.earliest_date;
        let single = |date: NaiveDate| -> Result<Self> {
            if date < earliest {
                bail!("{date} is before the earliest available date {earliest}");
            }
            Ok(Self::Single(date))
        };

        if use_today && on_date.is_some() {
            bail!("--today and --on-date are mutually exclusive");
        }
        if (use_today || on_date.is_some()) && (start_date.is_some() || end_date.is_some()) {
            bail!("--start-date/--end-date cannot be combined with --today or --on-date");
        }
        if use_today {
            return single(today());
        }
        if let Some(raw) = on_date {
            return single(parse_date(&raw, "date")?);
        }

        let start = start_date
            .as_deref()
            .map(|s| parse_date(s, "start date"))
            .transpose()?
            .unwrap_or(earliest);
        let end = end_date
            .as_deref()
            .map(|s| parse_date(s, "end date"))
            .transpose()?
            .unwrap_or_else(today);

        if start < earliest {
            bail!("--start-date {start} is before the earliest available date {earliest}");
        }
        if start > end {
            bail!("--start-date {start} cannot be after --end-date {end}");
        }
        // only weekend days before `end`: its dataset covers the whole range
        if business_days_between(start, end) == 0 {
            return Ok(Self::Single(end));
        }
        Ok(Self::Range { start, end })
    }
}

fn run_download(
    config: &AppConfig,
    request: DownloadRequest,
    yes: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if let DownloadRequest::Range { start, end } = request {
        // inclusive of the end date, like the range download itself
        let total_days = business_days_between(start, end) + 1;
        if total_days >= LARGE_RANGE_DAYS && !yes && !confirm_large_range(total_days)? {
            info!("Download cancelled");
            return Ok(());
        }
    }

    let circuit_breaker = Arc::new(CircuitBreaker::default_archive());
    let fetcher = HttpFetcher::new(&config.archive, circuit_breaker)
        .context("failed to build HTTP client")?;
    let anchor = config.reference_anchor();
    let resolver = Resolver::new(
        &anchor,
        &fetcher,
        &config.archive.probe_artifact,
        config.anchor.max_iterations,
    );
    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let downloader = Downloader::new(resolver, &config.archive.artifacts, output_dir, &LogProgress);

    match request {
        DownloadRequest::Single(date) => {
            let summary = downloader.download_single(date)?;
            report_day(&summary)
        }
        DownloadRequest::Range { start, end } => {
            let summary = downloader.download_range(start, end)?;
            report_range(&summary)
        }
    }
}

fn confirm_large_range(total_days: i64) -> Result<bool> {
    print!(
        "WARNING: Estimated {total_days} days of data will be downloaded. \
         This is a large range. Proceed? (Y/N) "
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "Y" | "y"))
}

fn report_day(summary: &DaySummary) -> Result<()> {
    if summary.failed() > 0 {
        for (artifact, outcome) in &summary.outcomes {
            if let dayfetch_core::ArtifactOutcome::TransportError(detail) = outcome {
                error!("Error for {artifact}: {detail}");
            }
        }
        bail!(
            "{} of {} files for {} failed",
            summary.failed(),
            summary.outcomes.len(),
            summary.resolution.date
        );
    }
    Ok(())
}

fn report_range(summary: &RangeSummary) -> Result<()> {
    for id in &summary.unavailable {
        warn!("Identifier {id} has no dataset");
    }
    for (id, err) in &summary.failed {
        error!("Error for identifier {id}: {err}");
    }

    let failed_days = summary.days.iter().filter(|day| day.failed() > 0).count();
    if !summary.failed.is_empty() || failed_days > 0 {
        bail!(
            "{} identifier lookups and {failed_days} days failed",
            summary.failed.len()
        );
    }
    Ok(())
}

fn run_schedule(
    config: &AppConfig,
    start_date: Option<String>,
    exec_at: ExecTime,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let today = today();
    let earliest = config.anchor.earliest_date;
    let start = start_date
        .as_deref()
        .map(|s| parse_date(s, "start date"))
        .transpose()?
        .unwrap_or(today);
    if start < earliest {
        bail!("--start-date {start} is before the earliest available date {earliest}");
    }
    if start > today {
        bail!("--start-date {start} cannot be after today's date {today}");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install interrupt handler")?;

    let circuit_breaker = Arc::new(CircuitBreaker::default_archive());
    let fetcher = HttpFetcher::new(&config.archive, circuit_breaker)
        .context("failed to build HTTP client")?;
    let anchor = config.reference_anchor();
    let resolver = Resolver::new(
        &anchor,
        &fetcher,
        &config.archive.probe_artifact,
        config.anchor.max_iterations,
    );
    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let downloader = Downloader::new(resolver, &config.archive.artifacts, output_dir, &LogProgress);
    let scheduler = Scheduler::new(&downloader, exec_at);

    let backlog = scheduler.catch_up(start, today, Backlog::new());
    if shutdown.load(Ordering::SeqCst) {
        error!("Program terminated by user");
        return Ok(());
    }

    scheduler.run(&SystemClock, &shutdown, backlog);
    error!("Program terminated by user");
    Ok(())
}
