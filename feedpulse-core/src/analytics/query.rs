//! Re-bucketing of stored points and series assembly.
//!
//! Stored points are daily. Reads at another granularity truncate each
//! point's timestamp to the requested bucket and merge points that land in
//! the same bucket: the merged value is the mean of the contributing values
//! and the merged count is the sum of their counts. Empty buckets are never
//! synthesized.

use super::metrics_registry;
use super::trend::summarize;
use crate::types::{ChoiceSeries, Granularity, MetricPoint, Series};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

type BucketKey = (DateTime<Utc>, String, Option<Uuid>, Option<Uuid>);

struct Bucket<'a> {
    first: &'a MetricPoint,
    value_sum: f64,
    values: usize,
    count: i64,
}

/// Merge `points` into buckets of `granularity`.
///
/// Output is ordered by bucket, then metric type, product and question.
pub fn rebucket(points: &[MetricPoint], granularity: Granularity) -> Vec<MetricPoint> {
    let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();

    for point in points {
        let key = (
            granularity.truncate(point.timestamp),
            point.metric_type.clone(),
            point.product_id,
            point.question_id,
        );
        let bucket = buckets.entry(key).or_insert(Bucket {
            first: point,
            value_sum: 0.0,
            values: 0,
            count: 0,
        });
        bucket.value_sum += point.value;
        bucket.values += 1;
        bucket.count += point.count;
    }

    buckets
        .into_iter()
        .map(|((timestamp, _, _, _), bucket)| MetricPoint {
            value: bucket.value_sum / bucket.values as f64,
            count: bucket.count,
            timestamp,
            granularity,
            ..bucket.first.clone()
        })
        .collect()
}

/// Group points into one series per (metric type, product).
///
/// Each series holds its re-bucketed points in timestamp order plus their
/// statistics. Series are ordered by metric type, then product.
pub fn build_series(points: &[MetricPoint], granularity: Granularity) -> Vec<Series> {
    let mut grouped: BTreeMap<(String, Option<Uuid>), Vec<MetricPoint>> = BTreeMap::new();
    for point in rebucket(points, granularity) {
        grouped
            .entry((point.metric_type.clone(), point.product_id))
            .or_default()
            .push(point);
    }

    grouped
        .into_iter()
        .map(|((metric_type, product_id), points)| {
            let metric_name = points
                .first()
                .map(|p| p.metric_name.clone())
                .unwrap_or_default();
            let metadata = points.first().and_then(|p| p.metadata.clone());
            Series {
                metric_type,
                metric_name,
                product_id,
                statistics: summarize(&points),
                points,
                metadata,
                choice_series: Vec::new(),
            }
        })
        .collect()
}

/// Fold per-option choice points into the matching question series.
///
/// A choice point belongs to the series whose metric type is its base
/// question metric and whose product matches. Options are grouped by the
/// slug in the metric type and labelled with the first recorded choice text,
/// falling back to the slug itself.
pub fn attach_choice_series(
    series: &mut [Series],
    choice_points: &[MetricPoint],
    granularity: Granularity,
) {
    for s in series.iter_mut() {
        if !metrics_registry::is_question_metric(&s.metric_type) {
            continue;
        }

        let mut by_choice: BTreeMap<&str, (String, Vec<MetricPoint>)> = BTreeMap::new();
        for point in choice_points.iter().filter(|p| p.product_id == s.product_id) {
            let Some((base, slug)) = metrics_registry::split_choice_metric(&point.metric_type)
            else {
                continue;
            };
            if base != s.metric_type {
                continue;
            }
            let choice = point
                .metadata
                .as_ref()
                .and_then(|m| m.choice_option.clone())
                .unwrap_or_else(|| slug.to_string());
            by_choice
                .entry(slug)
                .or_insert_with(|| (choice, Vec::new()))
                .1
                .push(point.clone());
        }

        if by_choice.is_empty() {
            continue;
        }

        s.choice_series = by_choice
            .into_values()
            .map(|(choice, points)| {
                let points = rebucket(&points, granularity);
                ChoiceSeries {
                    choice,
                    statistics: summarize(&points),
                    points,
                }
            })
            .collect();
        s.metadata.get_or_insert_with(Default::default).has_choice_series = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricMetadata, QuestionType, TrendDirection};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn point(metric_type: &str, ts: &str, value: f64, count: i64) -> MetricPoint {
        MetricPoint {
            organization_id: Uuid::from_u128(1),
            account_id: Uuid::from_u128(2),
            product_id: Some(Uuid::from_u128(10)),
            question_id: None,
            metric_type: metric_type.to_string(),
            metric_name: format!("{metric_type} name"),
            value,
            count,
            timestamp: at(ts),
            granularity: Granularity::Daily,
            metadata: None,
        }
    }

    #[test]
    fn test_weekly_rebucket_means_values_and_sums_counts() {
        // 2024-01-15 is a Monday
        let points = vec![
            point("average_rating", "2024-01-15T00:00:00Z", 4.0, 10),
            point("average_rating", "2024-01-17T00:00:00Z", 2.0, 5),
            point("average_rating", "2024-01-22T00:00:00Z", 3.0, 1),
        ];

        let merged = rebucket(&points, Granularity::Weekly);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].timestamp, at("2024-01-15T00:00:00Z"));
        assert_eq!(merged[0].value, 3.0);
        assert_eq!(merged[0].count, 15);
        assert_eq!(merged[0].granularity, Granularity::Weekly);
        assert_eq!(merged[1].value, 3.0);
        assert_eq!(merged[1].count, 1);
    }

    #[test]
    fn test_daily_rebucket_keeps_distinct_products_apart() {
        let mut other = point("average_rating", "2024-01-15T00:00:00Z", 1.0, 1);
        other.product_id = Some(Uuid::from_u128(11));
        let points = vec![point("average_rating", "2024-01-15T00:00:00Z", 5.0, 1), other];

        assert_eq!(rebucket(&points, Granularity::Daily).len(), 2);
        assert_eq!(rebucket(&points, Granularity::Monthly).len(), 2);
    }

    #[test]
    fn test_gaps_are_not_filled() {
        let points = vec![
            point("survey_responses", "2024-01-01T00:00:00Z", 3.0, 3),
            point("survey_responses", "2024-01-09T00:00:00Z", 1.0, 1),
        ];
        let series = build_series(&points, Granularity::Daily);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points.len(), 2);
    }

    #[test]
    fn test_series_per_metric_type_and_product() {
        let mut other_product = point("average_rating", "2024-01-02T00:00:00Z", 2.0, 1);
        other_product.product_id = None;
        let points = vec![
            point("survey_responses", "2024-01-01T00:00:00Z", 3.0, 3),
            point("average_rating", "2024-01-03T00:00:00Z", 5.0, 1),
            point("average_rating", "2024-01-01T00:00:00Z", 3.0, 1),
            other_product,
        ];

        let series = build_series(&points, Granularity::Daily);
        let keys: Vec<_> = series
            .iter()
            .map(|s| (s.metric_type.as_str(), s.product_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("average_rating", None),
                ("average_rating", Some(Uuid::from_u128(10))),
                ("survey_responses", Some(Uuid::from_u128(10))),
            ]
        );

        let rating = &series[1];
        assert_eq!(rating.metric_name, "average_rating name");
        assert!(rating
            .points
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(rating.statistics.total, 8.0);
        assert_eq!(rating.statistics.trend_direction, TrendDirection::Improving);
    }

    #[test]
    fn test_choice_series_attached_to_question_series() {
        let question = Uuid::from_u128(100);
        let base_type = metrics_registry::question_metric(question);
        let choice_point = |option: &str, ts: &str, count: i64| {
            let mut p = point(
                &metrics_registry::choice_metric(question, option),
                ts,
                count as f64,
                count,
            );
            p.question_id = Some(question);
            p.metadata = Some(MetricMetadata {
                question_type: Some(QuestionType::SingleChoice),
                choice_option: Some(option.to_string()),
                ..Default::default()
            });
            p
        };

        let mut series = build_series(
            &[point(&base_type, "2024-01-01T00:00:00Z", 5.0, 5)],
            Granularity::Daily,
        );
        let choices = vec![
            choice_point("Pepperoni", "2024-01-01T00:00:00Z", 3),
            choice_point("Veggie", "2024-01-01T00:00:00Z", 2),
            choice_point("Pepperoni", "2024-01-02T00:00:00Z", 4),
        ];
        attach_choice_series(&mut series, &choices, Granularity::Daily);

        let s = &series[0];
        assert!(s.metadata.as_ref().unwrap().has_choice_series);
        assert_eq!(s.choice_series.len(), 2);
        assert_eq!(s.choice_series[0].choice, "Pepperoni");
        assert_eq!(s.choice_series[0].points.len(), 2);
        assert_eq!(s.choice_series[0].statistics.total, 7.0);
        assert_eq!(s.choice_series[1].choice, "Veggie");
    }

    #[test]
    fn test_choice_series_merges_spellings_across_days() {
        let question = Uuid::from_u128(100);
        let base_type = metrics_registry::question_metric(question);
        let choice_point = |option: &str, ts: &str| {
            let mut p = point(&metrics_registry::choice_metric(question, option), ts, 1.0, 1);
            p.metadata = Some(MetricMetadata {
                choice_option: Some(option.to_string()),
                ..Default::default()
            });
            p
        };

        let mut series = build_series(
            &[point(&base_type, "2024-01-01T00:00:00Z", 2.0, 2)],
            Granularity::Monthly,
        );
        let choices = vec![
            choice_point("Extra Cheese", "2024-01-01T00:00:00Z"),
            choice_point("extra cheese", "2024-01-02T00:00:00Z"),
        ];
        attach_choice_series(&mut series, &choices, Granularity::Monthly);

        let choice_series = &series[0].choice_series;
        assert_eq!(choice_series.len(), 1);
        assert_eq!(choice_series[0].choice, "Extra Cheese");
        assert_eq!(choice_series[0].points.len(), 1);
        assert_eq!(choice_series[0].points[0].count, 2);
    }
}
