//! # feedpulse-core
//!
//! Core library for feedpulse - feedback metrics collection and analysis.
//!
//! This library provides:
//! - Aggregation of raw feedback submissions into daily metric points
//! - Versioned SQLite storage of those points
//! - Time series, trend statistics and period comparisons over them
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Collect:** providers hand over submissions, the [`collect::AnswerAggregator`]
//!   reduces them to daily [`MetricPoint`]s
//! - **Store:** [`Database::replace_metrics`] swaps an organization's points in
//!   as a new version
//! - **Query:** the [`analytics`] engines re-bucket, summarize and compare
//!   stored points
//!
//! [`MetricsService`] wires the three together.
//!
//! ## Example
//!
//! ```rust,no_run
//! use feedpulse_core::{Config, Database, MetricsService};
//! use feedpulse_core::provider::ExportDirectory;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let exports = Arc::new(ExportDirectory::load(&config.export_dir()).expect("no exports"));
//! let service = MetricsService::from_provider(exports.clone(), Arc::new(db), config.collection.clone());
//!
//! for org in exports.organization_ids() {
//!     let report = service.collect_metrics(org, &CancellationToken::new()).expect("collect");
//!     println!("{}: {} points", org, report.points_written);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, MetricFilter, MetricSnapshot};
pub use error::{Error, ErrorKind, Result};
pub use service::MetricsService;
pub use types::*;

// Public modules
pub mod analytics;
pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod provider;
pub mod sentiment;
pub mod service;
pub mod types;
