//! Database layer for feedpulse
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Versioned, batched replacement of an organization's metric points
//! - Filtered reads of the active version and time-based retention

pub mod repo;
pub mod schema;

pub use repo::{fingerprint, Database, MetricFilter, MetricSnapshot};
