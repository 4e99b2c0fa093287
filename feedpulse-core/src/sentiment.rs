//! Sentiment scoring for free-text answers.
//!
//! Polarity is the VADER compound score from the `vader_sentiment` crate:
//! word valences adjusted for boosters, negations, ALL-CAPS emphasis, a
//! contrastive "but" and exclamation marks, normalized into `[-1, 1]`.

use vader_sentiment::SentimentIntensityAnalyzer;

/// Sentiment scorer wrapping a VADER analyzer.
///
/// The analyzer borrows the crate's static lexicons, so construction is cheap
/// and [`score`](Self::score) is a pure function of its input.
pub struct SentimentScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    /// Polarity of `text` in `[-1, 1]`.
    ///
    /// Input without any letters or digits returns exactly `0.0` without
    /// reaching the analyzer.
    pub fn score(&self, text: &str) -> f64 {
        if !text.chars().any(char::is_alphanumeric) {
            return 0.0;
        }

        self.analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}
