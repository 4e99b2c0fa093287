//! Period-over-period comparison and insight generation.

use super::metrics_registry::{self, AVERAGE_RATING, COMPLETION_RATE, FEEDBACK_COUNT};
use crate::collect::{PeriodFold, ReducerRegistry};
use crate::types::{
    ChoiceInfo, Comparison, ComparisonRequest, Insight, MetricPoint, PeriodMetrics, QuestionType,
    Severity, TrendDirection,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Changes with a smaller magnitude (in percent) are stable.
pub const STABLE_CHANGE_PERCENT: f64 = 5.0;
/// Changes above this magnitude (in percent) produce an insight.
pub const INSIGHT_THRESHOLD_PERCENT: f64 = 20.0;
/// Insights above this magnitude (in percent) are warnings.
pub const WARNING_THRESHOLD_PERCENT: f64 = 50.0;

const TOP_CHOICES: usize = 3;

/// Compare two periods metric type by metric type.
///
/// Only metric types present in period 1 are compared. Choice breakdown
/// points (`question_<id>_choice_<slug>`) do not get comparisons of their own
/// unless requested by name; they feed the choice distribution of their
/// question instead. Output is ordered by metric type.
pub fn compare(
    period1: &[MetricPoint],
    period2: &[MetricPoint],
    request: &ComparisonRequest,
    registry: &ReducerRegistry,
) -> Vec<Comparison> {
    let first = group_by_type(period1, request);
    let second = group_by_type(period2, request);

    first
        .iter()
        .map(|(metric_type, points)| {
            let head = points[0];
            let p1 = aggregate_period(
                points,
                period1,
                request.period1_start,
                request.period1_end,
                registry,
            );

            let (p2, change, change_percent, trend) = match second.get(metric_type) {
                Some(points2) => {
                    let p2 = aggregate_period(
                        points2,
                        period2,
                        request.period2_start,
                        request.period2_end,
                        registry,
                    );
                    let change = p2.value - p1.value;
                    let change_percent = if p1.value != 0.0 {
                        change / p1.value * 100.0
                    } else {
                        0.0
                    };
                    (p2, change, change_percent, trend_for_change(change_percent))
                }
                None => (
                    PeriodMetrics::empty(request.period2_start, request.period2_end),
                    0.0,
                    0.0,
                    TrendDirection::Declining,
                ),
            };

            Comparison {
                metric_type: metric_type.clone(),
                metric_name: head.metric_name.clone(),
                period1: p1,
                period2: p2,
                change,
                change_percent,
                trend,
                metadata: head.metadata.clone(),
            }
        })
        .collect()
}

fn group_by_type<'a>(
    points: &'a [MetricPoint],
    request: &ComparisonRequest,
) -> BTreeMap<String, Vec<&'a MetricPoint>> {
    let mut grouped: BTreeMap<String, Vec<&MetricPoint>> = BTreeMap::new();
    for point in points {
        let is_choice = metrics_registry::split_choice_metric(&point.metric_type).is_some();
        if is_choice && !request.metric_types.contains(&point.metric_type) {
            continue;
        }
        grouped
            .entry(point.metric_type.clone())
            .or_default()
            .push(point);
    }
    grouped
}

/// Trend for a period-over-period change in percent.
pub fn trend_for_change(change_percent: f64) -> TrendDirection {
    if change_percent.abs() < STABLE_CHANGE_PERCENT {
        TrendDirection::Stable
    } else if change_percent > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// Aggregate one metric type's points over a window.
///
/// `period_points` is every point read for the window; for choice questions
/// it supplies the per-option breakdown.
pub fn aggregate_period(
    points: &[&MetricPoint],
    period_points: &[MetricPoint],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    registry: &ReducerRegistry,
) -> PeriodMetrics {
    let Some(head) = points.first() else {
        return PeriodMetrics::empty(start, end);
    };

    let total: f64 = points.iter().map(|p| p.value).sum();
    let count: i64 = points.iter().map(|p| p.count).sum();
    let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let average = total / points.len() as f64;

    let question_type = head.question_type();
    let value = match registry.period_fold(question_type) {
        PeriodFold::Mean => average,
        PeriodFold::Sum => total,
    };

    let mut period = PeriodMetrics {
        start,
        end,
        value,
        count,
        average,
        min,
        max,
        data_points: points.iter().map(|p| (*p).clone()).collect(),
        choice_distribution: None,
        most_popular_choice: None,
        top_choices: Vec::new(),
    };

    if matches!(
        question_type,
        Some(QuestionType::SingleChoice | QuestionType::MultiChoice)
    ) && metrics_registry::is_question_metric(&head.metric_type)
    {
        let distribution = choice_distribution(&head.metric_type, period_points);
        if !distribution.is_empty() {
            let top = top_choices(&distribution);
            period.most_popular_choice = top.first().cloned();
            period.top_choices = top;
            period.choice_distribution = Some(distribution);
        }
    }

    period
}

/// Sum of counts per option over the choice points of `question_metric_type`.
///
/// Options sharing a slug are merged under the first recorded choice text.
fn choice_distribution(
    question_metric_type: &str,
    period_points: &[MetricPoint],
) -> BTreeMap<String, i64> {
    let mut by_slug: BTreeMap<&str, (String, i64)> = BTreeMap::new();
    for point in period_points {
        let Some((base, slug)) = metrics_registry::split_choice_metric(&point.metric_type) else {
            continue;
        };
        if base != question_metric_type {
            continue;
        }
        let choice = point
            .metadata
            .as_ref()
            .and_then(|m| m.choice_option.clone())
            .unwrap_or_else(|| slug.to_string());
        by_slug.entry(slug).or_insert_with(|| (choice, 0)).1 += point.count;
    }

    let mut distribution = BTreeMap::new();
    for (choice, count) in by_slug.into_values() {
        *distribution.entry(choice).or_insert(0) += count;
    }
    distribution
}

/// Up to three most picked options, ties broken alphabetically.
fn top_choices(distribution: &BTreeMap<String, i64>) -> Vec<ChoiceInfo> {
    let mut ranked: Vec<ChoiceInfo> = distribution
        .iter()
        .map(|(choice, count)| ChoiceInfo {
            choice: choice.clone(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.choice.cmp(&b.choice)));
    ranked.truncate(TOP_CHOICES);
    ranked
}

/// Flag comparisons whose change exceeds the insight threshold.
pub fn generate_insights(comparisons: &[Comparison]) -> Vec<Insight> {
    comparisons
        .iter()
        .filter(|c| c.change_percent.abs() > INSIGHT_THRESHOLD_PERCENT)
        .map(|c| Insight {
            insight_type: "significant_change".to_string(),
            severity: if c.change_percent.abs() > WARNING_THRESHOLD_PERCENT {
                Severity::Warning
            } else {
                Severity::Info
            },
            message: format!(
                "{} has changed by {:.1}% between periods",
                c.metric_name, c.change_percent
            ),
            metric_type: c.metric_type.clone(),
            change: c.change_percent,
            recommendation: recommendation(&c.metric_type, c.change_percent).map(str::to_string),
        })
        .collect()
}

fn recommendation(metric_type: &str, change_percent: f64) -> Option<&'static str> {
    match metric_type {
        AVERAGE_RATING if change_percent < -10.0 => {
            Some("Review recent feedback to identify areas of concern")
        }
        FEEDBACK_COUNT if change_percent < -20.0 => {
            Some("Consider increasing customer engagement efforts")
        }
        COMPLETION_RATE if change_percent < -15.0 => {
            Some("Simplify the feedback process to improve completion rates")
        }
        _ => None,
    }
}
