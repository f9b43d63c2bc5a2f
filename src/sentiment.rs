// =============================================================================
// Sentiment classifier collaborator
// =============================================================================
//
// The sentiment engine calls `classify` once per document, synchronously.
// Implementations may be remote models; the engine treats every call as
// fallible and records failures instead of propagating them.
//
// `LexiconClassifier` is the offline default: keyword polarity over the
// lower-cased text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Label;

/// Magnitude of a decisive per-document score.
pub const DOCUMENT_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Positive, Negative or Neutral.
    pub label: Label,
    /// Compound score in [-0.5, +0.5].
    pub score: f64,
    pub reason: String,
}

impl Classification {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            label: Label::Neutral,
            score: 0.0,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
}

pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}

// =============================================================================
// Lexicon classifier
// =============================================================================

const POSITIVE_WORDS: &[&str] = &[
    "surge", "surges", "rally", "rallies", "gain", "gains", "bullish", "soar", "soars", "record",
    "high", "inflows", "approval", "approved", "adoption", "breakout", "rebound", "upgrade",
    "buy", "accumulate", "accumulation", "growth", "partnership", "etf", "jump", "jumps",
];

const NEGATIVE_WORDS: &[&str] = &[
    "crash", "crashes", "plunge", "plunges", "drop", "drops", "bearish", "selloff", "sell-off",
    "hack", "hacked", "exploit", "ban", "lawsuit", "outflows", "liquidation", "liquidations",
    "fear", "dump", "decline", "declines", "fraud", "sued", "slump", "loss", "losses",
];

#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl LexiconClassifier {
    pub fn with_words(positive: Vec<String>, negative: Vec<String>) -> Self {
        Self { positive, negative }
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|t| !t.is_empty())
            .collect();

        let pos = tokens.iter().filter(|t| self.positive.iter().any(|w| w == *t)).count();
        let neg = tokens.iter().filter(|t| self.negative.iter().any(|w| w == *t)).count();

        let reason = format!("{pos} positive / {neg} negative cue words");
        let classification = match pos.cmp(&neg) {
            std::cmp::Ordering::Greater => Classification {
                label: Label::Positive,
                score: DOCUMENT_SCORE,
                reason,
            },
            std::cmp::Ordering::Less => Classification {
                label: Label::Negative,
                score: -DOCUMENT_SCORE,
                reason,
            },
            std::cmp::Ordering::Equal => Classification::neutral(reason),
        };
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_positive() {
        let c = LexiconClassifier::default()
            .classify("Bitcoin ETF inflows surge to record high")
            .unwrap();
        assert_eq!(c.label, Label::Positive);
        assert_eq!(c.score, 0.5);
    }

    #[test]
    fn lexicon_negative() {
        let c = LexiconClassifier::default()
            .classify("Exchange hacked, BTC plunges as liquidations mount")
            .unwrap();
        assert_eq!(c.label, Label::Negative);
        assert_eq!(c.score, -0.5);
    }

    #[test]
    fn lexicon_balanced_is_neutral() {
        let c = LexiconClassifier::default().classify("Rally fades into selloff").unwrap();
        assert_eq!(c.label, Label::Neutral);
        assert_eq!(c.score, 0.0);
    }

    #[test]
    fn custom_words() {
        let c = LexiconClassifier::with_words(vec!["moon".into()], vec![])
            .classify("to the moon")
            .unwrap();
        assert_eq!(c.label, Label::Positive);
    }
}
