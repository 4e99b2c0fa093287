//! Logging setup for feedpulse
//!
//! Every run appends to a daily-rotated file, by default under
//! `$XDG_STATE_HOME/feedpulse/`. Collection runs log per-organization summaries
//! there; with `stderr` enabled, warnings and errors are mirrored to the
//! terminal as well.
//!
//! Filtering: `RUST_LOG` wins when set. Otherwise the configured level applies
//! to the feedpulse crates and everything else is held at `warn`, so rusqlite
//! and tokio chatter stays out of the file.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Prefix of the rotated log files; rotation appends the date.
const LOG_FILE_PREFIX: &str = "feedpulse.log";

/// Crates whose events follow the configured level.
const OWN_TARGETS: [&str; 2] = ["feedpulse_core", "feedpulse"];

/// Install the global subscriber for a binary.
///
/// Fails on an unknown level or an unwritable log directory. The returned
/// guard must be held until exit so buffered lines reach the file.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = log_dir(config);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {}", e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        stderr = config.stderr,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        log_dir,
        _guard: guard,
    })
}

/// Subscriber for tests: everything `RUST_LOG` allows, through the test writer.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Filter directives for `level`: feedpulse crates at `level`, others at `warn`.
pub fn filter_directives(level: &str) -> Result<String> {
    let level: LevelFilter = level
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("unknown log level: {:?}", level)))?;
    let level = level.to_string().to_lowercase();

    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    Ok(directives.join(","))
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let directives = filter_directives(level)?;
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid log filter {:?}: {}", directives, e)))
}

/// Directory the rotated files go to.
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    config
        .directory
        .clone()
        .unwrap_or_else(Config::state_dir)
}

/// Keeps the background writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    log_dir: PathBuf,
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
