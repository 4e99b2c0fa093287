//! Per-question-type answer reducers
//!
//! A reducer folds every answer in one grouping bucket into a single metric
//! value. Reducers are looked up by [`QuestionKind`] in a [`ReducerRegistry`],
//! so supporting a new question type means registering a reducer rather than
//! editing a central branch.
//!
//! ## Built-in reducers
//!
//! | Kind | Reducer | Value |
//! |------|---------|-------|
//! | rating, scale | [`MeanReducer`] | mean of numeric answers |
//! | yes/no | [`YesNoReducer`] | `100 * yes / total` |
//! | text | [`SentimentReducer`] | mean polarity of non-blank answers |
//! | choice, other | [`CountReducer`] | number of answers |

use crate::sentiment::SentimentScorer;
use crate::types::{Answer, QuestionKind, QuestionType};
use std::collections::HashMap;

/// How points of one question kind combine across a comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFold {
    /// The period value is the sum of point values (counts, tallies)
    Sum,
    /// The period value is the mean of point values (scores, rates)
    Mean,
}

/// Folds the answers of one bucket into a metric value.
///
/// Reducers must be deterministic. Answers of an unexpected shape are
/// skipped, never treated as errors; the caller still reports the full group
/// size as the point's `count`.
pub trait AnswerReducer: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Reduce a non-empty group of answers to a value.
    fn reduce(&self, answers: &[&Answer]) -> f64;

    /// How this kind's points combine over a period.
    fn period_fold(&self) -> PeriodFold {
        PeriodFold::Sum
    }
}

/// Arithmetic mean of numeric answers; `0.0` when none are numeric.
pub struct MeanReducer;

impl AnswerReducer for MeanReducer {
    fn name(&self) -> &str {
        "mean"
    }

    fn reduce(&self, answers: &[&Answer]) -> f64 {
        let values: Vec<f64> = answers.iter().filter_map(|a| a.as_number()).collect();
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn period_fold(&self) -> PeriodFold {
        PeriodFold::Mean
    }
}

/// Percentage of affirmative answers over all answers.
pub struct YesNoReducer;

impl AnswerReducer for YesNoReducer {
    fn name(&self) -> &str {
        "yes_no"
    }

    fn reduce(&self, answers: &[&Answer]) -> f64 {
        if answers.is_empty() {
            return 0.0;
        }
        let yes = answers.iter().filter(|a| a.is_affirmative()).count();
        (yes as f64 / answers.len() as f64) * 100.0
    }

    fn period_fold(&self) -> PeriodFold {
        PeriodFold::Mean
    }
}

/// Mean sentiment polarity over non-blank text answers.
pub struct SentimentReducer {
    scorer: SentimentScorer,
}

impl SentimentReducer {
    pub fn new() -> Self {
        Self {
            scorer: SentimentScorer::new(),
        }
    }
}

impl Default for SentimentReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerReducer for SentimentReducer {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn reduce(&self, answers: &[&Answer]) -> f64 {
        let scores: Vec<f64> = answers
            .iter()
            .filter_map(|a| a.as_text())
            .filter(|t| !t.trim().is_empty())
            .map(|t| self.scorer.score(t))
            .collect();
        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Number of answers in the group.
pub struct CountReducer;

impl AnswerReducer for CountReducer {
    fn name(&self) -> &str {
        "count"
    }

    fn reduce(&self, answers: &[&Answer]) -> f64 {
        answers.len() as f64
    }
}

/// Lookup table from question kind to reducer.
///
/// Kinds without a registered reducer fall back to [`CountReducer`].
pub struct ReducerRegistry {
    reducers: HashMap<QuestionKind, Box<dyn AnswerReducer>>,
    fallback: CountReducer,
}

impl ReducerRegistry {
    /// Create an empty registry (every kind counts).
    pub fn new() -> Self {
        Self {
            reducers: HashMap::new(),
            fallback: CountReducer,
        }
    }

    /// Register (or replace) the reducer for a kind.
    pub fn register(&mut self, kind: QuestionKind, reducer: Box<dyn AnswerReducer>) {
        tracing::debug!(?kind, reducer = reducer.name(), "Registered answer reducer");
        self.reducers.insert(kind, reducer);
    }

    /// Reducer used for `kind`.
    pub fn reducer_for(&self, kind: QuestionKind) -> &dyn AnswerReducer {
        self.reducers
            .get(&kind)
            .map(|r| r.as_ref())
            .unwrap_or(&self.fallback as &dyn AnswerReducer)
    }

    /// Reduce a group of answers declared as `question_type`.
    pub fn reduce(&self, question_type: &QuestionType, answers: &[&Answer]) -> f64 {
        self.reducer_for(question_type.kind()).reduce(answers)
    }

    /// Period fold for points of `question_type`; untyped points sum.
    pub fn period_fold(&self, question_type: Option<&QuestionType>) -> PeriodFold {
        question_type
            .map(|qt| self.reducer_for(qt.kind()).period_fold())
            .unwrap_or(PeriodFold::Sum)
    }

    /// Whether a reducer is registered for `kind`.
    pub fn has_reducer(&self, kind: QuestionKind) -> bool {
        self.reducers.contains_key(&kind)
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        create_default_registry()
    }
}

/// Create a registry with all built-in reducers registered.
pub fn create_default_registry() -> ReducerRegistry {
    let mut registry = ReducerRegistry::new();
    registry.register(QuestionKind::Rating, Box::new(MeanReducer));
    registry.register(QuestionKind::Scale, Box::new(MeanReducer));
    registry.register(QuestionKind::YesNo, Box::new(YesNoReducer));
    registry.register(QuestionKind::Text, Box::new(SentimentReducer::new()));
    registry.register(QuestionKind::SingleChoice, Box::new(CountReducer));
    registry.register(QuestionKind::MultiChoice, Box::new(CountReducer));
    registry
}
