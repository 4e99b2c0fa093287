//! Answer aggregation: raw submissions to candidate metric points
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   day bucket    ┌────────────────────────────┐
//! │ Submissions  │ ──────────────► │ Grouping (request-local)   │
//! │ (provider)   │                 │  (day, product, type)      │
//! └──────────────┘                 │  (day, product, question)  │
//!                                  │  day -> submission count   │
//!                                  └─────────────┬──────────────┘
//!                                                │ ReducerRegistry
//!                                                ▼
//!                                  ┌────────────────────────────┐
//!                                  │ MetricPoint (daily)        │
//!                                  └────────────────────────────┘
//! ```
//!
//! Every emitted point is daily. A group's `count` is always the number of
//! answers folded into it, even when the reducer skipped some of them.

pub mod reducers;

pub use reducers::{
    create_default_registry, AnswerReducer, CountReducer, MeanReducer, PeriodFold,
    ReducerRegistry, SentimentReducer, YesNoReducer,
};

use crate::analytics::metrics_registry;
use crate::types::{
    Answer, Granularity, MetricMetadata, MetricPoint, Organization, QuestionMeta, QuestionType,
    Submission,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Answers sharing (day, product, question type).
struct TypeGroup<'a> {
    answers: Vec<&'a Answer>,
}

/// Answers to one question on one day for one product.
struct QuestionGroup<'a> {
    question_type: QuestionType,
    question_text: String,
    product_name: String,
    answers: Vec<&'a Answer>,
}

type TypeKey = (DateTime<Utc>, Option<Uuid>, QuestionType);
type QuestionKey = (DateTime<Utc>, Option<Uuid>, Uuid);

/// Turns one organization's submissions into daily metric points.
pub struct AnswerAggregator {
    registry: ReducerRegistry,
}

impl AnswerAggregator {
    pub fn new(registry: ReducerRegistry) -> Self {
        Self { registry }
    }

    /// The reducer registry in use.
    pub fn registry(&self) -> &ReducerRegistry {
        &self.registry
    }

    /// Aggregate `submissions` into metric points for `organization`.
    ///
    /// `questions` carries whatever question metadata could be resolved;
    /// questions missing from it are still aggregated, only without scale
    /// bounds and labels.
    pub fn collect(
        &self,
        organization: &Organization,
        submissions: &[Submission],
        questions: &HashMap<Uuid, QuestionMeta>,
    ) -> Vec<MetricPoint> {
        let mut by_type: BTreeMap<TypeKey, TypeGroup> = BTreeMap::new();
        let mut by_question: BTreeMap<QuestionKey, QuestionGroup> = BTreeMap::new();
        let mut submissions_by_day: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();

        for submission in submissions {
            let day = Granularity::Daily.truncate(submission.created_at);
            *submissions_by_day.entry(day).or_insert(0) += 1;

            let product_name = submission
                .product_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

            for response in &submission.responses {
                by_type
                    .entry((day, submission.product_id, response.question_type.clone()))
                    .or_insert_with(|| TypeGroup {
                        answers: Vec::new(),
                    })
                    .answers
                    .push(&response.answer);

                if let Some(question_id) = response.question() {
                    by_question
                        .entry((day, submission.product_id, question_id))
                        .or_insert_with(|| QuestionGroup {
                            question_type: response.question_type.clone(),
                            question_text: response.question_text.clone(),
                            product_name: product_name.clone(),
                            answers: Vec::new(),
                        })
                        .answers
                        .push(&response.answer);
                }
            }
        }

        let point = |product_id: Option<Uuid>,
                     question_id: Option<Uuid>,
                     metric_type: String,
                     metric_name: String,
                     value: f64,
                     count: i64,
                     timestamp: DateTime<Utc>,
                     metadata: Option<MetricMetadata>| MetricPoint {
            organization_id: organization.id,
            account_id: organization.account_id,
            product_id,
            question_id,
            metric_type,
            metric_name,
            value,
            count,
            timestamp,
            granularity: Granularity::Daily,
            metadata,
        };

        let mut points = Vec::new();

        for ((day, product_id, question_type), group) in &by_type {
            if group.answers.is_empty() {
                continue;
            }
            points.push(point(
                *product_id,
                None,
                metrics_registry::question_type_metric(question_type),
                question_type.metric_label().to_string(),
                self.registry.reduce(question_type, &group.answers),
                group.answers.len() as i64,
                *day,
                Some(MetricMetadata::for_type(question_type.clone())),
            ));
        }

        for ((day, product_id, question_id), group) in &by_question {
            if group.answers.is_empty() {
                continue;
            }
            let question = questions.get(question_id);
            let metadata = MetricMetadata {
                question_type: Some(group.question_type.clone()),
                question_text: Some(group.question_text.clone()),
                ..Default::default()
            }
            .with_question(question);

            points.push(point(
                *product_id,
                Some(*question_id),
                metrics_registry::question_metric(*question_id),
                format!("{} - {}", group.product_name, group.question_text),
                self.registry.reduce(&group.question_type, &group.answers),
                group.answers.len() as i64,
                *day,
                Some(metadata.clone()),
            ));

            if matches!(
                group.question_type,
                QuestionType::SingleChoice | QuestionType::MultiChoice
            ) {
                for (choice, count) in
                    choice_distribution(&group.question_type, &group.answers).into_values()
                {
                    points.push(point(
                        *product_id,
                        Some(*question_id),
                        metrics_registry::choice_metric(*question_id, &choice),
                        format!(
                            "{} - {}: {}",
                            group.product_name, group.question_text, choice
                        ),
                        count as f64,
                        count,
                        *day,
                        Some(MetricMetadata {
                            choice_option: Some(choice),
                            ..metadata.clone()
                        }),
                    ));
                }
            }
        }

        for (day, submissions) in &submissions_by_day {
            points.push(point(
                None,
                None,
                metrics_registry::SURVEY_RESPONSES.to_string(),
                "Total Survey Responses".to_string(),
                *submissions as f64,
                *submissions,
                *day,
                None,
            ));
        }

        tracing::debug!(
            organization_id = %organization.id,
            submissions = submissions.len(),
            points = points.len(),
            "Aggregated submissions into metric points"
        );

        points
    }
}

impl Default for AnswerAggregator {
    fn default() -> Self {
        Self::new(create_default_registry())
    }
}

/// Tally selected options per choice for one question group.
///
/// Options are keyed by their metric slug, so spellings that differ only in
/// case or spaces versus underscores share one entry. The first spelling seen
/// is kept as the display text.
fn choice_distribution(
    question_type: &QuestionType,
    answers: &[&Answer],
) -> BTreeMap<String, (String, i64)> {
    let mut distribution: BTreeMap<String, (String, i64)> = BTreeMap::new();
    for answer in answers {
        let options = match question_type {
            QuestionType::MultiChoice => multi_choice_options(answer),
            _ => answer.as_text().and_then(clean_option).into_iter().collect(),
        };
        for option in options {
            distribution
                .entry(metrics_registry::choice_slug(&option))
                .or_insert_with(|| (option, 0))
                .1 += 1;
        }
    }
    distribution
}

/// Options of a multi-choice answer: a JSON list, a JSON-array string, or a
/// comma-separated string.
fn multi_choice_options(answer: &Answer) -> Vec<String> {
    match answer {
        Answer::List(items) => items
            .iter()
            .filter_map(|item| item.as_text())
            .filter_map(clean_option)
            .collect(),
        Answer::Text(raw) => {
            if raw.trim().is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(items) => items.iter().filter_map(|s| clean_option(s)).collect(),
                Err(_) => raw.split(',').filter_map(clean_option).collect(),
            }
        }
        _ => Vec::new(),
    }
}

fn clean_option(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Response;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn org() -> Organization {
        Organization {
            id: Uuid::from_u128(1),
            account_id: Uuid::from_u128(2),
        }
    }

    fn product() -> Uuid {
        Uuid::from_u128(10)
    }

    fn question() -> Uuid {
        Uuid::from_u128(100)
    }

    fn submission(created_at: &str, responses: Vec<Response>) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            created_at: at(created_at),
            product_id: Some(product()),
            product_name: Some("Margherita".to_string()),
            responses,
        }
    }

    fn response(question_type: QuestionType, answer: Answer) -> Response {
        Response {
            question_id: Some(question()),
            question_text: "How was it?".to_string(),
            question_type,
            answer,
        }
    }

    fn find<'a>(points: &'a [MetricPoint], metric_type: &str) -> Vec<&'a MetricPoint> {
        points.iter().filter(|p| p.metric_type == metric_type).collect()
    }

    #[test]
    fn test_ten_identical_ratings_make_one_daily_point() {
        let submissions: Vec<_> = (0..10)
            .map(|i| {
                submission(
                    &format!("2024-01-01T{:02}:15:00Z", i + 8),
                    vec![response(QuestionType::Rating, Answer::Number(4.0))],
                )
            })
            .collect();

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());

        let question_points = find(&points, &metrics_registry::question_metric(question()));
        assert_eq!(question_points.len(), 1);
        let p = question_points[0];
        assert_eq!(p.value, 4.0);
        assert_eq!(p.count, 10);
        assert_eq!(p.timestamp, at("2024-01-01T00:00:00Z"));
        assert_eq!(p.product_id, Some(product()));
        assert_eq!(p.metric_name, "Margherita - How was it?");

        let type_points = find(&points, "rating_questions");
        assert_eq!(type_points.len(), 1);
        assert_eq!(type_points[0].metric_name, "Rating Questions");
        assert_eq!(type_points[0].value, 4.0);

        let surveys = find(&points, metrics_registry::SURVEY_RESPONSES);
        assert_eq!(surveys.len(), 1);
        assert_eq!(surveys[0].value, 10.0);
        assert_eq!(surveys[0].count, 10);
    }

    #[test]
    fn test_numeric_group_excludes_non_numeric_from_mean_but_counts_them() {
        let submissions = vec![
            submission(
                "2024-01-01T09:00:00Z",
                vec![response(QuestionType::Scale, Answer::Number(8.0))],
            ),
            submission(
                "2024-01-01T10:00:00Z",
                vec![response(QuestionType::Scale, Answer::Text("n/a".to_string()))],
            ),
            submission(
                "2024-01-01T11:00:00Z",
                vec![response(QuestionType::Scale, Answer::Number(6.0))],
            ),
        ];

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());
        let p = find(&points, &metrics_registry::question_metric(question()))[0];
        assert_eq!(p.value, 7.0);
        assert_eq!(p.count, 3);
    }

    #[test]
    fn test_yes_no_group() {
        let answers = [true, true, false, true, false];
        let submissions: Vec<_> = answers
            .iter()
            .map(|a| {
                submission(
                    "2024-02-03T12:00:00Z",
                    vec![response(QuestionType::YesNo, Answer::Bool(*a))],
                )
            })
            .collect();

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());
        let p = find(&points, &metrics_registry::question_metric(question()))[0];
        assert_eq!(p.value, 60.0);
        assert_eq!(p.count, 5);
    }

    #[test]
    fn test_text_group_without_valid_text_emits_zero() {
        let submissions = vec![submission(
            "2024-02-03T12:00:00Z",
            vec![
                response(QuestionType::Text, Answer::Text("  ".to_string())),
                response(QuestionType::Text, Answer::Null),
            ],
        )];

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());
        let p = find(&points, "text_questions")[0];
        assert_eq!(p.value, 0.0);
        assert_eq!(p.count, 2);
    }

    #[test]
    fn test_submissions_split_across_days() {
        let submissions = vec![
            submission("2024-01-01T01:00:00Z", vec![]),
            submission("2024-01-01T23:00:00Z", vec![]),
            submission("2024-01-02T00:30:00Z", vec![]),
        ];

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());
        let surveys = find(&points, metrics_registry::SURVEY_RESPONSES);
        assert_eq!(surveys.len(), 2);
        assert_eq!(surveys[0].timestamp, at("2024-01-01T00:00:00Z"));
        assert_eq!(surveys[0].value, 2.0);
        assert_eq!(surveys[1].value, 1.0);
        // No responses means no question groups
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_choice_breakdown_points() {
        let submissions = vec![
            submission(
                "2024-03-01T10:00:00Z",
                vec![response(
                    QuestionType::MultiChoice,
                    Answer::List(vec![
                        Answer::Text("Extra Cheese".to_string()),
                        Answer::Text("Olives".to_string()),
                    ]),
                )],
            ),
            submission(
                "2024-03-01T11:00:00Z",
                vec![response(
                    QuestionType::MultiChoice,
                    Answer::Text("Olives, 'Basil'".to_string()),
                )],
            ),
            submission(
                "2024-03-01T12:00:00Z",
                vec![response(
                    QuestionType::MultiChoice,
                    Answer::Text(r#"["Extra Cheese"]"#.to_string()),
                )],
            ),
        ];

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());

        let base = find(&points, &metrics_registry::question_metric(question()))[0];
        assert_eq!(base.value, 3.0);
        assert_eq!(base.count, 3);

        let cheese = find(&points, &metrics_registry::choice_metric(question(), "Extra Cheese"))[0];
        assert_eq!(cheese.value, 2.0);
        assert_eq!(
            cheese.metadata.as_ref().unwrap().choice_option.as_deref(),
            Some("Extra Cheese")
        );
        assert_eq!(
            find(&points, &metrics_registry::choice_metric(question(), "Olives"))[0].count,
            2
        );
        assert_eq!(
            find(&points, &metrics_registry::choice_metric(question(), "Basil"))[0].count,
            1
        );
    }

    #[test]
    fn test_choice_spellings_sharing_a_slug_make_one_point() {
        let submissions: Vec<_> = ["Olives", "olives", "Extra Cheese", "extra_cheese"]
            .iter()
            .map(|choice| {
                submission(
                    "2024-03-01T10:00:00Z",
                    vec![response(
                        QuestionType::SingleChoice,
                        Answer::Text(choice.to_string()),
                    )],
                )
            })
            .collect();

        let points = AnswerAggregator::default().collect(&org(), &submissions, &HashMap::new());

        let mut keys: Vec<_> = points
            .iter()
            .map(|p| (p.product_id, p.question_id, p.metric_type.clone(), p.timestamp))
            .collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);

        let olives = find(&points, &metrics_registry::choice_metric(question(), "Olives"));
        assert_eq!(olives.len(), 1);
        assert_eq!(olives[0].count, 2);
        assert_eq!(
            olives[0].metadata.as_ref().unwrap().choice_option.as_deref(),
            Some("Olives")
        );

        let cheese = find(&points, &metrics_registry::choice_metric(question(), "extra cheese"));
        assert_eq!(cheese.len(), 1);
        assert_eq!(cheese[0].value, 2.0);
        assert_eq!(
            cheese[0].metadata.as_ref().unwrap().choice_option.as_deref(),
            Some("Extra Cheese")
        );
    }

    #[test]
    fn test_question_metadata_enrichment() {
        let submissions = vec![submission(
            "2024-01-01T09:00:00Z",
            vec![response(QuestionType::Rating, Answer::Number(5.0))],
        )];
        let mut questions = HashMap::new();
        questions.insert(
            question(),
            QuestionMeta {
                id: question(),
                question_type: QuestionType::Rating,
                min_value: Some(1.0),
                max_value: Some(5.0),
                min_label: Some("Poor".to_string()),
                max_label: Some(String::new()),
            },
        );

        let points = AnswerAggregator::default().collect(&org(), &submissions, &questions);
        let metadata = find(&points, &metrics_registry::question_metric(question()))[0]
            .metadata
            .clone()
            .unwrap();
        assert_eq!(metadata.min_value, Some(1.0));
        assert_eq!(metadata.max_value, Some(5.0));
        assert_eq!(metadata.min_label.as_deref(), Some("Poor"));
        assert_eq!(metadata.max_label, None);
        assert_eq!(metadata.question_text.as_deref(), Some("How was it?"));
    }

    #[test]
    fn test_output_is_unique_per_key_and_deterministic() {
        let submissions = vec![
            submission(
                "2024-01-01T09:00:00Z",
                vec![
                    response(QuestionType::Rating, Answer::Number(5.0)),
                    Response {
                        question_id: None,
                        question_text: "Anything else?".to_string(),
                        question_type: QuestionType::Text,
                        answer: Answer::Text("lovely".to_string()),
                    },
                ],
            ),
            submission(
                "2024-01-02T09:00:00Z",
                vec![response(QuestionType::Rating, Answer::Number(3.0))],
            ),
        ];

        let aggregator = AnswerAggregator::default();
        let first = aggregator.collect(&org(), &submissions, &HashMap::new());
        let second = aggregator.collect(&org(), &submissions, &HashMap::new());
        assert_eq!(first, second);

        let mut keys: Vec<_> = first
            .iter()
            .map(|p| (p.product_id, p.question_id, p.metric_type.clone(), p.timestamp))
            .collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }
}
