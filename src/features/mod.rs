// =============================================================================
// Feature Engine — observation batches to fixed-shape feature sets
// =============================================================================
//
// Every modality engine declares its schema up front. A `FeatureSet` is
// created from that schema with every feature at its neutral default and the
// engine then overwrites what the data supports. The set is therefore never
// partial, and the names that fell back to a default are tracked so scorers
// can tell "measured 0.0" from "no data".
//
// Non-finite values never enter a set: they are replaced by the default and
// marked as defaulted.

pub mod derivatives;
pub mod onchain;
pub mod orderbook;
pub mod sentiment;
pub mod technical;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FeatureResult;
use crate::types::{FeatureValue, Modality};

pub use derivatives::{DerivativesEngine, DerivativesInput};
pub use onchain::OnChainEngine;
pub use orderbook::{OrderBookEngine, OrderBookInput};
pub use sentiment::{ScoredDocument, SentimentAnalysis, SentimentBreakdown, SentimentEngine, SentimentInput};
pub use technical::TechnicalEngine;

/// Neutral tag used for categorical features without data.
pub const NEUTRAL_TAG: &str = "neutral";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Number,
    Tag,
}

/// One entry of a modality's feature schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: FeatureKind::Number,
        }
    }

    pub const fn tag(name: &'static str) -> Self {
        Self {
            name,
            kind: FeatureKind::Tag,
        }
    }

    pub fn default_value(&self) -> FeatureValue {
        match self.kind {
            FeatureKind::Number => FeatureValue::Number(0.0),
            FeatureKind::Tag => FeatureValue::Tag(NEUTRAL_TAG.to_string()),
        }
    }
}

/// Lookback limits shared by all engines. Counts of samples, never wall-clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Price bars handed to the technical engine (most recent kept).
    pub lookback_bars: usize,
    /// Upper bound on readings/snapshots any other engine looks at.
    pub max_samples: usize,
    /// N for "mean of first differences over the last N samples".
    pub momentum_samples: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            lookback_bars: 72,
            max_samples: 96,
            momentum_samples: 10,
        }
    }
}

impl WindowSpec {
    /// The trailing `max_samples` elements of `items`.
    pub fn tail<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[items.len().saturating_sub(self.max_samples)..]
    }
}

// =============================================================================
// FeatureSet
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    values: BTreeMap<String, FeatureValue>,
    /// Names currently holding their neutral default.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    defaulted: BTreeSet<String>,
}

impl FeatureSet {
    /// A set holding every schema feature at its default.
    pub fn from_schema(schema: &[FeatureSpec]) -> Self {
        let mut set = Self::default();
        for spec in schema {
            set.values.insert(spec.name.to_string(), spec.default_value());
            set.defaulted.insert(spec.name.to_string());
        }
        set
    }

    /// Record a numeric feature. `None` and non-finite values store 0.0 and
    /// mark the feature as defaulted.
    pub fn set_number(&mut self, name: &str, value: Option<f64>) {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.values.insert(name.to_string(), FeatureValue::Number(v));
                self.defaulted.remove(name);
            }
            None => {
                self.values.insert(name.to_string(), FeatureValue::Number(0.0));
                self.defaulted.insert(name.to_string());
            }
        }
    }

    pub fn set_tag(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(tag) => {
                self.values.insert(name.to_string(), FeatureValue::Tag(tag.to_string()));
                self.defaulted.remove(name);
            }
            None => {
                self.values
                    .insert(name.to_string(), FeatureValue::Tag(NEUTRAL_TAG.to_string()));
                self.defaulted.insert(name.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    /// Numeric value including defaults (0.0 when missing).
    pub fn number(&self, name: &str) -> f64 {
        self.values.get(name).and_then(FeatureValue::as_number).unwrap_or(0.0)
    }

    /// Numeric value only when it was computed from data.
    pub fn observed_number(&self, name: &str) -> Option<f64> {
        if self.is_defaulted(name) {
            return None;
        }
        self.values.get(name).and_then(FeatureValue::as_number)
    }

    pub fn observed_tag(&self, name: &str) -> Option<&str> {
        if self.is_defaulted(name) {
            return None;
        }
        self.values.get(name).and_then(FeatureValue::as_tag)
    }

    pub fn is_defaulted(&self, name: &str) -> bool {
        self.defaulted.contains(name) || !self.values.contains_key(name)
    }

    pub fn defaulted(&self) -> impl Iterator<Item = &str> {
        self.defaulted.iter().map(String::as_str)
    }

    pub fn all_defaulted(&self) -> bool {
        self.values.keys().all(|k| self.defaulted.contains(k))
    }

    /// True when every schema feature is present with the right kind.
    pub fn conforms_to(&self, schema: &[FeatureSpec]) -> bool {
        schema.iter().all(|spec| match (spec.kind, self.values.get(spec.name)) {
            (FeatureKind::Number, Some(FeatureValue::Number(v))) => v.is_finite(),
            (FeatureKind::Tag, Some(FeatureValue::Tag(_))) => true,
            _ => false,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// Engine contract
// =============================================================================

/// Per-modality transform from raw observations to a `FeatureSet`.
///
/// Missing data yields the schema defaults; only structurally impossible
/// input (negative prices, out-of-order timestamps) returns an error.
pub trait FeatureEngine: Send + Sync {
    type Input<'a>;

    fn modality(&self) -> Modality;

    fn schema(&self) -> &'static [FeatureSpec];

    fn build_features(&self, input: Self::Input<'_>, window: &WindowSpec) -> FeatureResult<FeatureSet>;
}

/// Schema of the engine serving `modality`.
pub fn schema_for(modality: Modality) -> &'static [FeatureSpec] {
    match modality {
        Modality::Technical => technical::SCHEMA,
        Modality::Sentiment => sentiment::SCHEMA,
        Modality::Derivatives => derivatives::SCHEMA,
        Modality::OnChain => onchain::SCHEMA,
        Modality::OrderBook => orderbook::SCHEMA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[FeatureSpec] = &[FeatureSpec::number("a"), FeatureSpec::tag("regime")];

    #[test]
    fn schema_set_is_complete_and_defaulted() {
        let set = FeatureSet::from_schema(SCHEMA);
        assert!(set.conforms_to(SCHEMA));
        assert!(set.all_defaulted());
        assert_eq!(set.number("a"), 0.0);
        assert_eq!(set.get("regime").and_then(FeatureValue::as_tag), Some(NEUTRAL_TAG));
    }

    #[test]
    fn non_finite_values_fall_back_to_default() {
        let mut set = FeatureSet::from_schema(SCHEMA);
        set.set_number("a", Some(f64::NAN));
        assert!(set.is_defaulted("a"));
        assert_eq!(set.number("a"), 0.0);

        set.set_number("a", Some(1.5));
        assert_eq!(set.observed_number("a"), Some(1.5));
        assert!(!set.is_defaulted("a"));

        set.set_number("a", Some(f64::INFINITY));
        assert_eq!(set.observed_number("a"), None);
    }

    #[test]
    fn observed_zero_is_not_defaulted() {
        let mut set = FeatureSet::from_schema(SCHEMA);
        set.set_number("a", Some(0.0));
        assert_eq!(set.observed_number("a"), Some(0.0));
        assert!(!set.all_defaulted());
    }

    #[test]
    fn window_tail_keeps_most_recent() {
        let w = WindowSpec {
            max_samples: 2,
            ..WindowSpec::default()
        };
        assert_eq!(w.tail(&[1, 2, 3]), &[2, 3]);
        assert_eq!(w.tail::<i32>(&[]), &[] as &[i32]);
    }

    #[test]
    fn feature_set_json_round_trip() {
        let mut set = FeatureSet::from_schema(SCHEMA);
        set.set_number("a", Some(0.1 + 0.2));
        let json = serde_json::to_string(&set).unwrap();
        let back: FeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
