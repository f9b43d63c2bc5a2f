// =============================================================================
// Shared types used across the signal-fusion pipeline
// =============================================================================

use serde::{Deserialize, Serialize};

/// One independent data source / analysis track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Technical,
    Sentiment,
    Derivatives,
    OnChain,
    OrderBook,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Self::Technical,
        Self::Sentiment,
        Self::Derivatives,
        Self::OnChain,
        Self::OrderBook,
    ];

    /// How the modality enters fusion. Sentiment is a scalar score and is
    /// squashed with tanh; every other modality contributes direction x confidence.
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Sentiment)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Technical => write!(f, "technical"),
            Self::Sentiment => write!(f, "sentiment"),
            Self::Derivatives => write!(f, "derivatives"),
            Self::OnChain => write!(f, "on_chain"),
            Self::OrderBook => write!(f, "order_book"),
        }
    }
}

/// Directional label produced by a modality scorer.
///
/// Market modalities use bullish/bearish, text modalities positive/negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Bullish,
    Bearish,
    Positive,
    Negative,
    Neutral,
}

impl Label {
    /// +1 for bullish/positive, -1 for bearish/negative, 0 for neutral.
    pub fn sign(self) -> f64 {
        match self {
            Self::Bullish | Self::Positive => 1.0,
            Self::Bearish | Self::Negative => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Decision over the prediction horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Abstain,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Abstain
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
            Self::Abstain => write!(f, "Abstain"),
        }
    }
}

/// A single feature value: numeric, or a categorical tag for regime labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Tag(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Tag(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Tag(t) => Some(t.as_str()),
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.6}"),
            Self::Tag(t) => write!(f, "{t}"),
        }
    }
}
