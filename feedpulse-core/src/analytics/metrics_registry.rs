//! Metric type vocabulary: reserved keys and generated key builders.

use crate::types::QuestionType;
use uuid::Uuid;

pub const FEEDBACK_COUNT: &str = "feedback_count";
pub const AVERAGE_RATING: &str = "average_rating";
pub const RESPONSE_RATE: &str = "response_rate";
pub const COMPLETION_RATE: &str = "completion_rate";
pub const SENTIMENT_SCORE: &str = "sentiment_score";
pub const QUESTION_SCORE: &str = "question_score";
pub const QR_SCAN_COUNT: &str = "qr_scan_count";
pub const CONVERSION_RATE: &str = "conversion_rate";
pub const RESPONSE_TIME: &str = "response_time";
pub const CUSTOMER_SATISFACTION: &str = "customer_satisfaction";

/// Daily submission count, emitted by every collection run.
pub const SURVEY_RESPONSES: &str = "survey_responses";

const QUESTION_PREFIX: &str = "question_";
const CHOICE_INFIX: &str = "_choice_";

/// Descriptor for a reserved metric type.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub summary: &'static str,
}

const RESERVED_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        name: FEEDBACK_COUNT,
        summary: "Number of feedback submissions.",
    },
    MetricDescriptor {
        name: AVERAGE_RATING,
        summary: "Mean rating across rating questions.",
    },
    MetricDescriptor {
        name: RESPONSE_RATE,
        summary: "Share of visitors who left feedback.",
    },
    MetricDescriptor {
        name: COMPLETION_RATE,
        summary: "Share of started feedback forms that were completed.",
    },
    MetricDescriptor {
        name: SENTIMENT_SCORE,
        summary: "Mean text sentiment polarity in [-1, 1].",
    },
    MetricDescriptor {
        name: QUESTION_SCORE,
        summary: "Aggregate score for a single question.",
    },
    MetricDescriptor {
        name: QR_SCAN_COUNT,
        summary: "Number of QR code scans.",
    },
    MetricDescriptor {
        name: CONVERSION_RATE,
        summary: "Share of scans that became submissions.",
    },
    MetricDescriptor {
        name: RESPONSE_TIME,
        summary: "Time taken to complete a feedback form.",
    },
    MetricDescriptor {
        name: CUSTOMER_SATISFACTION,
        summary: "Customer satisfaction score.",
    },
];

/// List all reserved metric types.
pub fn list_reserved() -> Vec<MetricDescriptor> {
    RESERVED_METRICS.to_vec()
}

/// Whether `metric_type` is one of the reserved keys.
pub fn is_reserved(metric_type: &str) -> bool {
    metric_type == SURVEY_RESPONSES || RESERVED_METRICS.iter().any(|m| m.name == metric_type)
}

/// `question_<id>`
pub fn question_metric(question_id: Uuid) -> String {
    format!("{QUESTION_PREFIX}{question_id}")
}

/// `<questiontype>_questions`
pub fn question_type_metric(question_type: &QuestionType) -> String {
    format!("{}_questions", question_type.as_str())
}

/// `question_<id>_choice_<slug>`
pub fn choice_metric(question_id: Uuid, choice: &str) -> String {
    format!(
        "{}{}{}",
        question_metric(question_id),
        CHOICE_INFIX,
        choice_slug(choice)
    )
}

/// Prefix shared by every choice metric of a question metric type.
pub fn choice_prefix(question_metric_type: &str) -> String {
    format!("{question_metric_type}{CHOICE_INFIX}")
}

/// Split `question_<id>_choice_<slug>` into the base metric type and slug.
pub fn split_choice_metric(metric_type: &str) -> Option<(&str, &str)> {
    if !metric_type.starts_with(QUESTION_PREFIX) {
        return None;
    }
    metric_type.split_once(CHOICE_INFIX)
}

/// Whether `metric_type` is a per-question key (`question_<id>`).
pub fn is_question_metric(metric_type: &str) -> bool {
    metric_type.starts_with(QUESTION_PREFIX) && split_choice_metric(metric_type).is_none()
}

/// Lowercase with spaces as `_`.
pub fn choice_slug(choice: &str) -> String {
    choice.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_vocabulary() {
        let names: Vec<_> = list_reserved().iter().map(|m| m.name).collect();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"qr_scan_count"));
        assert!(is_reserved(SURVEY_RESPONSES));
        assert!(!is_reserved("question_abc"));
    }

    #[test]
    fn test_generated_keys() {
        let id = Uuid::parse_str("6f1c2f2e-8a65-4a4b-9d8e-1b2c3d4e5f60").unwrap();
        assert_eq!(
            question_metric(id),
            "question_6f1c2f2e-8a65-4a4b-9d8e-1b2c3d4e5f60"
        );
        assert_eq!(question_type_metric(&QuestionType::YesNo), "yes_no_questions");

        let choice = choice_metric(id, "Extra Cheese");
        assert_eq!(
            choice,
            "question_6f1c2f2e-8a65-4a4b-9d8e-1b2c3d4e5f60_choice_extra_cheese"
        );
        assert_eq!(
            split_choice_metric(&choice),
            Some(("question_6f1c2f2e-8a65-4a4b-9d8e-1b2c3d4e5f60", "extra_cheese"))
        );
        assert!(is_question_metric(&question_metric(id)));
        assert!(!is_question_metric(&choice));
    }
}
