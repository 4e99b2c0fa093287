//! Core domain types for feedpulse
//!
//! These types describe both sides of the pipeline: the raw feedback
//! submissions handed to us by collaborators, and the aggregated metric points
//! and query results we produce from them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Submission** | One completed feedback form, holding one response per question |
//! | **Response** | A single answer to a single question inside a submission |
//! | **MetricPoint** | One aggregated observation; the atomic stored unit |
//! | **Granularity** | The bucket width timestamps are truncated to |
//! | **Bucket** | The truncated timestamp a point belongs to |
//! | **Series** | Points sharing a metric type and product, with statistics |
//! | **Comparison** | One metric type aggregated over two windows, with deltas |
//! | **Insight** | A generated flag for a large period-over-period change |

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================
// Granularity
// ============================================

/// Bucket width for metric timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    /// Truncate a timestamp to the start of its bucket (UTC).
    ///
    /// Weeks start on Monday, months on the 1st.
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Granularity::Hourly => {
                return ts
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(ts)
            }
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
        };
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN))
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Granularity::Hourly),
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(crate::error::Error::Validation(format!(
                "unknown granularity: {}",
                s
            ))),
        }
    }
}

// ============================================
// Questions and answers
// ============================================

/// Declared type of a feedback question.
///
/// Unknown wire values are preserved in [`QuestionType::Other`] so they
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    Rating,
    Scale,
    YesNo,
    Text,
    SingleChoice,
    MultiChoice,
    Other(String),
}

/// Payload-free discriminant of [`QuestionType`], used as a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuestionKind {
    Rating,
    Scale,
    YesNo,
    Text,
    SingleChoice,
    MultiChoice,
    Other,
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Rating => "rating",
            QuestionType::Scale => "scale",
            QuestionType::YesNo => "yes_no",
            QuestionType::Text => "text",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultiChoice => "multi_choice",
            QuestionType::Other(raw) => raw,
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionType::Rating => QuestionKind::Rating,
            QuestionType::Scale => QuestionKind::Scale,
            QuestionType::YesNo => QuestionKind::YesNo,
            QuestionType::Text => QuestionKind::Text,
            QuestionType::SingleChoice => QuestionKind::SingleChoice,
            QuestionType::MultiChoice => QuestionKind::MultiChoice,
            QuestionType::Other(_) => QuestionKind::Other,
        }
    }

    /// Display label for the per-type aggregate metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            QuestionType::Rating => "Rating Questions",
            QuestionType::Scale => "Scale Questions",
            QuestionType::YesNo => "Yes/No Questions",
            QuestionType::Text => "Text Sentiment",
            QuestionType::SingleChoice => "Single Choice Questions",
            QuestionType::MultiChoice => "Multiple Choice Questions",
            QuestionType::Other(_) => "Other Questions",
        }
    }
}

impl Default for QuestionType {
    fn default() -> Self {
        QuestionType::Other(String::new())
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rating" => QuestionType::Rating,
            "scale" => QuestionType::Scale,
            "yes_no" => QuestionType::YesNo,
            "text" => QuestionType::Text,
            "single_choice" => QuestionType::SingleChoice,
            "multi_choice" => QuestionType::MultiChoice,
            _ => QuestionType::Other(value),
        }
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        match value {
            QuestionType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A polymorphic answer value as it appears on the wire.
///
/// Deserializes untagged, so `null`, `true`, `4`, `"great"` and `["a", "b"]`
/// all map onto a variant without losing their JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Answer>),
}

impl Answer {
    /// Numeric value, if this answer is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Answer::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this answer is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this answer counts as "yes" for a yes/no question.
    pub fn is_affirmative(&self) -> bool {
        match self {
            Answer::Bool(b) => *b,
            Answer::Text(s) => matches!(s.as_str(), "true" | "yes" | "1"),
            Answer::Number(n) => *n == 1.0,
            Answer::Null | Answer::List(_) => false,
        }
    }
}

/// One answer within a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Question answered; absent for ad-hoc fields
    #[serde(default)]
    pub question_id: Option<Uuid>,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub answer: Answer,
}

impl Response {
    /// Question id, treating the nil UUID as absent.
    pub fn question(&self) -> Option<Uuid> {
        self.question_id.filter(|id| !id.is_nil())
    }
}

/// One feedback submission as returned by the feedback provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub responses: Vec<Response>,
}

/// Organization as returned by the organization provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub account_id: Uuid,
}

/// Question metadata as returned by the question provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMeta {
    pub id: Uuid,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub min_label: Option<String>,
    #[serde(default)]
    pub max_label: Option<String>,
}

// ============================================
// Metric points
// ============================================

/// Descriptive metadata attached to a metric point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_choice_series: bool,
}

impl MetricMetadata {
    /// Metadata carrying only a question type.
    pub fn for_type(question_type: QuestionType) -> Self {
        Self {
            question_type: Some(question_type),
            ..Default::default()
        }
    }

    /// Copy scale bounds and labels from question metadata.
    pub fn with_question(mut self, question: Option<&QuestionMeta>) -> Self {
        if let Some(q) = question {
            self.min_value = q.min_value;
            self.max_value = q.max_value;
            self.min_label = q.min_label.clone().filter(|l| !l.is_empty());
            self.max_label = q.max_label.clone().filter(|l| !l.is_empty());
        }
        self
    }
}

/// One aggregated observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub organization_id: Uuid,
    pub account_id: Uuid,
    pub product_id: Option<Uuid>,
    pub question_id: Option<Uuid>,
    /// Stable machine key (e.g. `survey_responses`, `question_<id>`)
    pub metric_type: String,
    /// Display label
    pub metric_name: String,
    pub value: f64,
    /// Number of raw observations folded into this point
    pub count: i64,
    /// Start of the bucket
    pub timestamp: DateTime<Utc>,
    pub granularity: Granularity,
    pub metadata: Option<MetricMetadata>,
}

impl MetricPoint {
    /// Question type recorded in the metadata, if any.
    pub fn question_type(&self) -> Option<&QuestionType> {
        self.metadata.as_ref().and_then(|m| m.question_type.as_ref())
    }
}

// ============================================
// Statistics and series
// ============================================

/// Direction of change for a series or comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistics over an ordered point sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// Sum of point counts
    pub count: i64,
    pub trend_direction: TrendDirection,
    /// `|R²|` of the ordinal-index regression
    pub trend_strength: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            total: 0.0,
            average: 0.0,
            min: 0.0,
            max: 0.0,
            count: 0,
            trend_direction: TrendDirection::Stable,
            trend_strength: 0.0,
        }
    }
}

/// Per-option breakdown of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceSeries {
    pub choice: String,
    pub points: Vec<MetricPoint>,
    pub statistics: Statistics,
}

/// Points sharing (metric_type, product_id), ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric_type: String,
    pub metric_name: String,
    pub product_id: Option<Uuid>,
    pub points: Vec<MetricPoint>,
    pub statistics: Statistics,
    pub metadata: Option<MetricMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choice_series: Vec<ChoiceSeries>,
}

// ============================================
// Comparison and insights
// ============================================

/// A choice option and how often it was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceInfo {
    pub choice: String,
    pub count: i64,
}

/// One metric type aggregated over a `[start, end)` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
    pub count: i64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub data_points: Vec<MetricPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_distribution: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_popular_choice: Option<ChoiceInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_choices: Vec<ChoiceInfo>,
}

impl PeriodMetrics {
    /// A window with no data.
    pub fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            value: 0.0,
            count: 0,
            average: 0.0,
            min: 0.0,
            max: 0.0,
            data_points: Vec::new(),
            choice_distribution: None,
            most_popular_choice: None,
            top_choices: Vec::new(),
        }
    }
}

/// Two periods of the same metric type with computed deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub metric_type: String,
    pub metric_name: String,
    pub period1: PeriodMetrics,
    pub period2: PeriodMetrics,
    pub change: f64,
    pub change_percent: f64,
    pub trend: TrendDirection,
    pub metadata: Option<MetricMetadata>,
}

/// Insight severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }
}

/// Human-readable flag for a significant change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: String,
    pub severity: Severity,
    pub message: String,
    pub metric_type: String,
    /// Change in percent
    pub change: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

// ============================================
// Requests and responses
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRequest {
    pub organization_id: Uuid,
    pub metric_types: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub granularity: Granularity,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub question_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSummary {
    pub total_data_points: usize,
    pub series_count: usize,
    pub date_range: DateRange,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResponse {
    pub request: TimeSeriesRequest,
    pub series: Vec<Series>,
    pub summary: TimeSeriesSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub organization_id: Uuid,
    pub metric_types: Vec<String>,
    pub period1_start: DateTime<Utc>,
    pub period1_end: DateTime<Utc>,
    pub period2_start: DateTime<Utc>,
    pub period2_end: DateTime<Utc>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub question_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResponse {
    pub request: ComparisonRequest,
    pub comparisons: Vec<Comparison>,
    pub insights: Vec<Insight>,
}

/// Outcome of one organization recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub organization_id: Uuid,
    /// Recompute version now active for the organization
    pub version: i64,
    pub points_written: usize,
    pub submissions_seen: usize,
    /// SHA-256 over the canonical point set
    pub fingerprint: String,
    /// True when the new set matches the previously active one
    pub unchanged: bool,
}
