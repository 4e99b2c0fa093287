//! Text rendering for command results.

use feedpulse_core::analytics::metrics_registry;
use feedpulse_core::{
    CollectionReport, Comparison, ComparisonResponse, PeriodMetrics, Series, TimeSeriesResponse,
};

pub fn print_collection_report(report: &CollectionReport) {
    println!(
        "  {}: version {}, {} point(s) from {} submission(s){}",
        report.organization_id,
        report.version,
        report.points_written,
        report.submissions_seen,
        if report.unchanged { " (unchanged)" } else { "" }
    );
}

pub fn print_time_series(response: &TimeSeriesResponse) {
    let summary = &response.summary;
    if response.series.is_empty() {
        println!("No metric points found.");
        return;
    }

    for series in &response.series {
        print_series(series);
        println!();
    }

    println!("---");
    println!(
        "{} series, {} data point(s), {} buckets from {} to {}",
        summary.series_count,
        summary.total_data_points,
        summary.granularity,
        summary.date_range.start.format("%Y-%m-%d %H:%M"),
        summary.date_range.end.format("%Y-%m-%d %H:%M")
    );
}

fn print_series(series: &Series) {
    println!("{} ({})", series.metric_name, series.metric_type);
    if let Some(product) = series.product_id {
        println!("  Product: {}", product);
    }
    if let Some(meta) = &series.metadata {
        if let (Some(min), Some(max)) = (meta.min_value, meta.max_value) {
            let labels = match (&meta.min_label, &meta.max_label) {
                (Some(lo), Some(hi)) => format!(" ({} .. {})", lo, hi),
                _ => String::new(),
            };
            println!("  Scale: {} - {}{}", format_value(min), format_value(max), labels);
        }
    }

    for point in &series.points {
        println!(
            "  {}  {:>8}  (n={})",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            format_value(point.value),
            point.count
        );
    }

    let stats = &series.statistics;
    println!(
        "  avg {}, min {}, max {}, trend {} (strength {:.2})",
        format_value(stats.average),
        format_value(stats.min),
        format_value(stats.max),
        stats.trend_direction,
        stats.trend_strength
    );

    if !series.choice_series.is_empty() {
        println!("  Choices:");
        for choice in &series.choice_series {
            println!("    {}: {}", choice.choice, choice.statistics.count);
        }
    }
}

pub fn print_comparison(response: &ComparisonResponse) {
    if response.comparisons.is_empty() {
        println!("No metric points found in period 1.");
        return;
    }

    for comparison in &response.comparisons {
        print_comparison_entry(comparison);
        println!();
    }

    if !response.insights.is_empty() {
        println!("Insights:");
        for insight in &response.insights {
            println!("  [{}] {}", insight.severity.as_str(), insight.message);
            if let Some(recommendation) = &insight.recommendation {
                println!("      {}", recommendation);
            }
        }
    }
}

fn print_comparison_entry(comparison: &Comparison) {
    println!("{} ({})", comparison.metric_name, comparison.metric_type);
    print_period("period 1", &comparison.period1);
    print_period("period 2", &comparison.period2);
    println!(
        "  change:   {} ({:+.1}%), {}",
        format_value(comparison.change),
        comparison.change_percent,
        comparison.trend
    );
}

fn print_period(label: &str, period: &PeriodMetrics) {
    let popular = period
        .most_popular_choice
        .as_ref()
        .map(|c| format!(", most popular {} ({})", c.choice, c.count))
        .unwrap_or_default();
    println!(
        "  {}: {}  (n={}){}",
        label,
        format_value(period.value),
        period.count,
        popular
    );
}

pub fn print_metric_types() {
    println!("Reserved metric types:");
    for metric in metrics_registry::list_reserved() {
        println!("  {:<24} {}", metric.name, metric.summary);
    }
    println!();
    println!("Generated by collection:");
    println!(
        "  {:<24} Submissions per day.",
        metrics_registry::SURVEY_RESPONSES
    );
    println!("  {:<24} Aggregate over every question of a type.", "<type>_questions");
    println!("  {:<24} One question.", "question_<id>");
    println!(
        "  {:<24} Selections of one option of a choice question.",
        "question_<id>_choice_<option>"
    );
}

/// Whole numbers without decimals, everything else to two places.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(-1.75), "-1.75");
        assert_eq!(format_value(2.0 / 3.0), "0.67");
    }
}
