//! Metrics service facade
//!
//! Wires the collaborator providers, the metric store and the analytics
//! engines into the four operations callers use:
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`collect_metrics`](MetricsService::collect_metrics) | recompute one organization's points |
//! | [`get_time_series`](MetricsService::get_time_series) | read series at a granularity |
//! | [`get_comparison`](MetricsService::get_comparison) | compare two windows, with insights |
//! | [`cleanup_old_metrics`](MetricsService::cleanup_old_metrics) | drop points past retention |
//!
//! Reads never write. Nothing here retries or times out; cancellation is
//! checked between steps.

use crate::analytics::{self, metrics_registry};
use crate::collect::AnswerAggregator;
use crate::config::CollectionConfig;
use crate::db::{Database, MetricFilter};
use crate::error::{Error, Result};
use crate::provider::{FeedbackProvider, OrganizationProvider, QuestionProvider};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Entry point for collection and queries.
pub struct MetricsService {
    organizations: Arc<dyn OrganizationProvider>,
    feedback: Arc<dyn FeedbackProvider>,
    questions: Arc<dyn QuestionProvider>,
    db: Arc<Database>,
    aggregator: AnswerAggregator,
    config: CollectionConfig,
}

impl MetricsService {
    pub fn new(
        organizations: Arc<dyn OrganizationProvider>,
        feedback: Arc<dyn FeedbackProvider>,
        questions: Arc<dyn QuestionProvider>,
        db: Arc<Database>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            organizations,
            feedback,
            questions,
            db,
            aggregator: AnswerAggregator::default(),
            config,
        }
    }

    /// Build a service from one value implementing all three provider traits.
    pub fn from_provider<P>(provider: Arc<P>, db: Arc<Database>, config: CollectionConfig) -> Self
    where
        P: FeedbackProvider + OrganizationProvider + QuestionProvider + 'static,
    {
        Self::new(provider.clone(), provider.clone(), provider, db, config)
    }

    /// Replace the default aggregator (e.g. with custom reducers).
    pub fn with_aggregator(mut self, aggregator: AnswerAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ============================================
    // Collection
    // ============================================

    /// Recompute and replace all metric points of one organization.
    ///
    /// Looks up the organization, fetches up to `submission_limit` recent
    /// submissions, resolves question metadata, aggregates daily points and
    /// swaps them in as a new version. Unresolvable questions are aggregated
    /// without metadata.
    pub fn collect_metrics(
        &self,
        organization_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<CollectionReport> {
        check_cancelled(cancel)?;
        let organization = self.organizations.get_organization(organization_id)?;

        check_cancelled(cancel)?;
        let submissions = self
            .feedback
            .fetch_recent(organization_id, self.config.submission_limit)?;
        tracing::info!(
            organization_id = %organization_id,
            submissions = submissions.len(),
            limit = self.config.submission_limit,
            "Fetched submissions"
        );

        check_cancelled(cancel)?;
        let questions = self.resolve_questions(&submissions);
        let points = self
            .aggregator
            .collect(&organization, &submissions, &questions);

        check_cancelled(cancel)?;
        let mut report =
            self.db
                .replace_metrics(organization_id, &points, self.config.batch_size, cancel)?;
        report.submissions_seen = submissions.len();

        tracing::info!(
            organization_id = %organization_id,
            version = report.version,
            points = report.points_written,
            unchanged = report.unchanged,
            "Collected metrics"
        );
        Ok(report)
    }

    fn resolve_questions(&self, submissions: &[Submission]) -> HashMap<Uuid, QuestionMeta> {
        let ids: BTreeSet<Uuid> = submissions
            .iter()
            .flat_map(|s| s.responses.iter())
            .filter_map(|r| r.question())
            .collect();

        let mut questions = HashMap::new();
        for id in ids {
            match self.questions.get_question(id) {
                Ok(question) => {
                    questions.insert(id, question);
                }
                Err(e) => {
                    tracing::debug!(question_id = %id, error = %e, "Question metadata unavailable");
                }
            }
        }
        questions
    }

    // ============================================
    // Queries
    // ============================================

    /// Series for the requested metric types over `[start_date, end_date)`.
    pub fn get_time_series(
        &self,
        request: &TimeSeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<TimeSeriesResponse> {
        validate_window(request.start_date, request.end_date, "time series")?;
        validate_metric_types(&request.metric_types)?;
        check_cancelled(cancel)?;

        let filter = MetricFilter {
            metric_types: request.metric_types.clone(),
            product_id: request.product_id,
            question_id: request.question_id,
            ..MetricFilter::new(request.organization_id, request.start_date, request.end_date)
        };
        let points = self.db.find_metrics(&filter)?;

        check_cancelled(cancel)?;
        let choice_points = self.read_choice_points(&filter)?;

        let mut series = analytics::build_series(&points, request.granularity);
        analytics::attach_choice_series(&mut series, &choice_points, request.granularity);

        let summary = TimeSeriesSummary {
            total_data_points: series.iter().map(|s| s.points.len()).sum(),
            series_count: series.len(),
            date_range: DateRange {
                start: request.start_date,
                end: request.end_date,
            },
            granularity: request.granularity,
        };

        tracing::debug!(
            organization_id = %request.organization_id,
            granularity = %request.granularity,
            series = summary.series_count,
            points = summary.total_data_points,
            "Built time series"
        );

        Ok(TimeSeriesResponse {
            request: request.clone(),
            series,
            summary,
        })
    }

    /// Compare the requested metric types across two windows.
    pub fn get_comparison(
        &self,
        request: &ComparisonRequest,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResponse> {
        validate_window(request.period1_start, request.period1_end, "period 1")?;
        validate_window(request.period2_start, request.period2_end, "period 2")?;
        validate_metric_types(&request.metric_types)?;

        let period1 = self.read_period(request, request.period1_start, request.period1_end, cancel)?;
        let period2 = self.read_period(request, request.period2_start, request.period2_end, cancel)?;

        let comparisons =
            analytics::compare(&period1, &period2, request, self.aggregator.registry());
        let insights = analytics::generate_insights(&comparisons);

        tracing::debug!(
            organization_id = %request.organization_id,
            comparisons = comparisons.len(),
            insights = insights.len(),
            "Compared periods"
        );

        Ok(ComparisonResponse {
            request: request.clone(),
            comparisons,
            insights,
        })
    }

    /// Daily points of one window, including choice breakdowns.
    fn read_period(
        &self,
        request: &ComparisonRequest,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>> {
        check_cancelled(cancel)?;
        let filter = MetricFilter {
            metric_types: request.metric_types.clone(),
            product_id: request.product_id,
            question_id: request.question_id,
            ..MetricFilter::new(request.organization_id, start, end)
        };
        let mut points = self.db.find_metrics(&filter)?;
        points.extend(self.read_choice_points(&filter)?);
        Ok(analytics::rebucket(&points, Granularity::Daily))
    }

    /// Choice breakdown points for every question metric type in `filter`.
    fn read_choice_points(&self, filter: &MetricFilter) -> Result<Vec<MetricPoint>> {
        let mut choice_types = Vec::new();
        for metric_type in &filter.metric_types {
            if metrics_registry::is_question_metric(metric_type) {
                choice_types.extend(self.db.metric_types_with_prefix(
                    filter.organization_id,
                    &metrics_registry::choice_prefix(metric_type),
                )?);
            }
        }
        choice_types.retain(|t| !filter.metric_types.contains(t));
        if choice_types.is_empty() {
            return Ok(Vec::new());
        }

        self.db.find_metrics(&MetricFilter {
            metric_types: choice_types,
            ..filter.clone()
        })
    }

    // ============================================
    // Retention
    // ============================================

    /// Delete points older than `retention_days` days, across organizations.
    pub fn cleanup_old_metrics(&self, retention_days: u32) -> Result<usize> {
        if retention_days == 0 {
            return Err(Error::validation("retention must be at least one day"));
        }
        self.cleanup_before(Utc::now() - Duration::days(i64::from(retention_days)))
    }

    /// Delete points bucketed before `cutoff`, across organizations.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.db.delete_metrics_older_than(cutoff)?;
        tracing::info!(cutoff = %cutoff, removed, "Retention cleanup complete");
        Ok(removed)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>, label: &str) -> Result<()> {
    if start >= end {
        return Err(Error::validation(format!(
            "{} start {} must be before end {}",
            label,
            start.to_rfc3339(),
            end.to_rfc3339()
        )));
    }
    Ok(())
}

fn validate_metric_types(metric_types: &[String]) -> Result<()> {
    if metric_types.is_empty() {
        return Err(Error::validation("at least one metric type is required"));
    }
    if metric_types.iter().any(|t| t.trim().is_empty()) {
        return Err(Error::validation("metric types must not be blank"));
    }
    Ok(())
}
