//! feedpulse - CLI for feedback metrics
//!
//! This tool provides commands for:
//! - Recomputing organization metrics from export files
//! - Reading time series and period comparisons from the metric store
//! - Applying the retention policy
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/feedpulse/metrics.db (~/.local/share/feedpulse/metrics.db)
//! - Logs: $XDG_STATE_HOME/feedpulse/feedpulse.log.<date> (~/.local/state/feedpulse/)
//! - Config: $XDG_CONFIG_HOME/feedpulse/config.toml (~/.config/feedpulse/config.toml)

mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use feedpulse_core::provider::{ExportDirectory, MemoryProvider};
use feedpulse_core::{
    CollectionReport, ComparisonRequest, Config, Database, Granularity, MetricsService,
    TimeSeriesRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "feedpulse")]
#[command(about = "Collect, query and compare feedback metrics")]
#[command(version)]
struct Args {
    /// Also print warnings and errors to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute metrics for organizations in the export directory
    Collect {
        /// Organization to collect (repeatable; default: every exported organization)
        #[arg(long = "org")]
        orgs: Vec<Uuid>,

        /// Export directory (default: from config)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Show time series for metric types
    Series {
        #[arg(long)]
        org: Uuid,

        /// Metric type to read (repeatable)
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,

        /// Window start, inclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        from: DateTime<Utc>,

        /// Window end, exclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        to: DateTime<Utc>,

        /// hourly, daily, weekly or monthly
        #[arg(short, long, default_value = "daily")]
        granularity: String,

        #[arg(long)]
        product: Option<Uuid>,

        #[arg(long)]
        question: Option<Uuid>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Compare metric types across two periods
    Compare {
        #[arg(long)]
        org: Uuid,

        /// Metric type to compare (repeatable)
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,

        #[arg(long, value_parser = parse_date)]
        p1_start: DateTime<Utc>,

        #[arg(long, value_parser = parse_date)]
        p1_end: DateTime<Utc>,

        #[arg(long, value_parser = parse_date)]
        p2_start: DateTime<Utc>,

        #[arg(long, value_parser = parse_date)]
        p2_end: DateTime<Utc>,

        #[arg(long)]
        product: Option<Uuid>,

        #[arg(long)]
        question: Option<Uuid>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Delete metric points past the retention window
    Cleanup {
        /// Retention in days (default: from config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// List reserved and generated metric types
    Metrics,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if args.verbose {
        config.logging.stderr = true;
    }

    // Initialize logging
    let log_guard =
        feedpulse_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Collect { orgs, source } => {
            cmd_collect(&config, orgs, source, log_guard.log_dir())
        }
        Command::Series {
            org,
            metrics,
            from,
            to,
            granularity,
            product,
            question,
            format,
        } => {
            let request = TimeSeriesRequest {
                organization_id: org,
                metric_types: metrics,
                start_date: from,
                end_date: to,
                granularity: granularity.parse::<Granularity>()?,
                product_id: product,
                question_id: question,
            };
            cmd_series(&config, &request, format)
        }
        Command::Compare {
            org,
            metrics,
            p1_start,
            p1_end,
            p2_start,
            p2_end,
            product,
            question,
            format,
        } => {
            let request = ComparisonRequest {
                organization_id: org,
                metric_types: metrics,
                period1_start: p1_start,
                period1_end: p1_end,
                period2_start: p2_start,
                period2_end: p2_end,
                product_id: product,
                question_id: question,
            };
            cmd_compare(&config, &request, format)
        }
        Command::Cleanup { days } => cmd_cleanup(&config, days),
        Command::Metrics => {
            output::print_metric_types();
            Ok(())
        }
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

fn open_database() -> Result<Arc<Database>> {
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(Arc::new(db))
}

/// A service for read-only commands; queries never consult the providers.
fn query_service(config: &Config) -> Result<MetricsService> {
    Ok(MetricsService::from_provider(
        Arc::new(MemoryProvider::new()),
        open_database()?,
        config.collection.clone(),
    ))
}

// ============================================
// collect
// ============================================

fn cmd_collect(
    config: &Config,
    orgs: Vec<Uuid>,
    source: Option<PathBuf>,
    log_dir: &Path,
) -> Result<()> {
    let export_dir = source.unwrap_or_else(|| config.export_dir());
    let exports = Arc::new(
        ExportDirectory::load(&export_dir)
            .with_context(|| format!("failed to load exports from {}", export_dir.display()))?,
    );

    let orgs = if orgs.is_empty() {
        exports.organization_ids()
    } else {
        orgs
    };
    if orgs.is_empty() {
        println!("No organization exports found in {}", export_dir.display());
        return Ok(());
    }

    println!("Database: {}", Config::database_path().display());
    println!(
        "Collecting {} organization(s) from {}",
        orgs.len(),
        exports.root().display()
    );

    let service = Arc::new(MetricsService::from_provider(
        exports,
        open_database()?,
        config.collection.clone(),
    ));

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let results = runtime.block_on(collect_concurrently(service, orgs));

    let total = results.len();
    let mut failed = 0;
    println!("\nCollection complete:");
    for (org, result) in &results {
        match result {
            Ok(report) => output::print_collection_report(report),
            Err(e) => {
                failed += 1;
                println!("  {}: failed: {:#}", org, e);
            }
        }
    }

    tracing::info!(organizations = total, failed, "feedpulse collect complete");

    if failed > 0 {
        println!("See {} for details.", log_dir.display());
        anyhow::bail!("{} of {} organization(s) failed to collect", failed, total);
    }
    Ok(())
}

/// Run one blocking collection per organization, cancelled together on Ctrl+C.
async fn collect_concurrently(
    service: Arc<MetricsService>,
    orgs: Vec<Uuid>,
) -> Vec<(Uuid, Result<CollectionReport>)> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_signal.cancel();
        }
    });

    let pb = ProgressBar::new(orgs.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let handles: Vec<_> = orgs
        .into_iter()
        .map(|org| {
            let service = service.clone();
            let cancel = cancel.clone();
            let pb = pb.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let result = service.collect_metrics(org, &cancel);
                pb.set_message(org.to_string());
                pb.inc(1);
                result
            });
            (org, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (org, handle) in handles {
        let result = match handle.await {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::from(e).context("collection task failed")),
        };
        if let Err(ref e) = result {
            tracing::warn!(organization_id = %org, error = %e, "Collection failed");
        }
        results.push((org, result));
    }

    pb.finish_and_clear();
    results
}

// ============================================
// series / compare
// ============================================

fn cmd_series(config: &Config, request: &TimeSeriesRequest, format: Format) -> Result<()> {
    let service = query_service(config)?;
    let response = service
        .get_time_series(request, &CancellationToken::new())
        .context("failed to read time series")?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => output::print_time_series(&response),
    }
    Ok(())
}

fn cmd_compare(config: &Config, request: &ComparisonRequest, format: Format) -> Result<()> {
    let service = query_service(config)?;
    let response = service
        .get_comparison(request, &CancellationToken::new())
        .context("failed to compare periods")?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => output::print_comparison(&response),
    }
    Ok(())
}

// ============================================
// cleanup
// ============================================

fn cmd_cleanup(config: &Config, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(config.retention.days);
    let service = query_service(config)?;
    let removed = service
        .cleanup_old_metrics(days)
        .context("retention cleanup failed")?;

    println!(
        "Removed {} metric point(s) older than {} day(s)",
        removed, days
    );
    Ok(())
}
