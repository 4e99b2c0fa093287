//! Summary statistics and trend detection over ordered points.
//!
//! The trend is an ordinary least-squares fit of value against the point's
//! position in the sequence (0, 1, 2, ...), not against its timestamp, so
//! gaps between buckets do not affect the slope.

use crate::types::{MetricPoint, Statistics, TrendDirection};

/// Slopes with a smaller magnitude are reported as stable.
pub const STABLE_SLOPE: f64 = 0.01;

/// Compute statistics for a timestamp-ordered point sequence.
pub fn summarize(points: &[MetricPoint]) -> Statistics {
    if points.is_empty() {
        return Statistics::default();
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let total: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (trend_direction, trend_strength) = trend(&values);

    Statistics {
        total,
        average: total / values.len() as f64,
        min,
        max,
        count: points.iter().map(|p| p.count).sum(),
        trend_direction,
        trend_strength,
    }
}

/// Direction and `|R²|` of the ordinal-index regression.
pub fn trend(values: &[f64]) -> (TrendDirection, f64) {
    let n = values.len();
    if n < 2 {
        return (TrendDirection::Stable, 0.0);
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return (TrendDirection::Stable, 0.0);
    }

    let slope = sxy / sxx;
    let r_squared = (sxy * sxy) / (sxx * syy);
    let strength = if r_squared.is_nan() {
        0.0
    } else {
        r_squared.abs()
    };

    let direction = if slope.abs() < STABLE_SLOPE {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };

    (direction, strength)
}
