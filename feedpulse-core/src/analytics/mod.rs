//! Analytics module for feedpulse
//!
//! Read-side engines over stored metric points:
//! - Metric type vocabulary ([`metrics_registry`])
//! - Re-bucketing and series assembly ([`query`])
//! - Summary statistics and trend detection ([`trend`])
//! - Period comparison and insights ([`compare`])
//!
//! All engines are pure functions of their input points; storage access
//! happens in [`crate::service`].

pub mod compare;
pub mod metrics_registry;
pub mod query;
pub mod trend;

pub use compare::{aggregate_period, compare, generate_insights, trend_for_change};
pub use metrics_registry::{list_reserved, MetricDescriptor};
pub use query::{attach_choice_series, build_series, rebucket};
pub use trend::summarize;
