// =============================================================================
// Modality Scorer — rule tables as data
// =============================================================================
//
// Every modality is scored by the same evaluator over a static `ScoreTable`:
//
//   1. Walk the rules in order. A rule adds to the running score, scales it,
//      or (weighted-mean tables) adds a value·weight term.
//   2. Rules whose input feature holds a default contribute nothing.
//   3. Optional clamp, then a symmetric dead zone picks the label.
//   4. Confidence comes from |score| through a bounded affine curve that
//      never reaches 0 or 1.
//
// Scoring is total: any feature set, including an all-default one, yields a
// finite score.

pub mod tables;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSet;
use crate::types::{Label, Modality};

// =============================================================================
// Rule vocabulary
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cmp {
    Above(f64),
    Below(f64),
}

impl Cmp {
    pub fn matches(self, value: f64) -> bool {
        match self {
            Self::Above(t) => value > t,
            Self::Below(t) => value < t,
        }
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above(t) => write!(f, "> {t}"),
            Self::Below(t) => write!(f, "< {t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Add(f64),
    Scale(f64),
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(v) => write!(f, "{v:+.2}"),
            Self::Scale(m) => write!(f, "x{m:.2}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub when: Cmp,
    pub effect: Effect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// First matching band wins.
    Bands {
        feature: &'static str,
        bands: &'static [Band],
    },
    /// +weight when the feature is positive, -weight when negative.
    Sign { feature: &'static str, weight: f64 },
    /// sign(v) · weight · min(cap, |v| / reference · factor)
    ScaledSign {
        feature: &'static str,
        reference: &'static str,
        factor: f64,
        cap: f64,
        weight: f64,
    },
    /// Oscillator pair: both above `upper` => +extreme, both below `lower` =>
    /// -extreme, otherwise ±cross by which line leads.
    CrossPair {
        fast: &'static str,
        slow: &'static str,
        upper: f64,
        lower: f64,
        extreme: f64,
        cross: f64,
    },
    /// Effect keyed by a categorical feature.
    Tag {
        feature: &'static str,
        cases: &'static [(&'static str, Effect)],
    },
    /// value · weight term of a weighted mean (or a plain sum).
    Linear { feature: &'static str, weight: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Score is the running sum after all rules.
    Sum,
    /// Score is Σ value·weight / Σ weight over the linear rules that fired.
    WeightedMean,
}

/// |score| -> confidence.
///
/// directional: min(max, base + min(|s|, score_cap) · slope)
/// neutral:     neutral_base - |s| · neutral_decay
/// Both are kept inside [floor, max].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceCurve {
    pub base: f64,
    pub slope: f64,
    pub score_cap: f64,
    pub max: f64,
    pub neutral_base: f64,
    pub neutral_decay: f64,
    pub floor: f64,
}

impl ConfidenceCurve {
    pub fn confidence(&self, score: f64, directional: bool) -> f64 {
        let s = score.abs();
        let c = if directional {
            self.base + s.min(self.score_cap) * self.slope
        } else {
            self.neutral_base - s * self.neutral_decay
        };
        c.clamp(self.floor, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreTable {
    pub modality: Modality,
    pub rules: &'static [Rule],
    pub aggregation: Aggregation,
    pub clamp: Option<f64>,
    pub dead_zone: f64,
    pub confidence: ConfidenceCurve,
    /// Labels for positive and negative scores.
    pub labels: (Label, Label),
}

// =============================================================================
// ModalityScore
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityScore {
    pub modality: Modality,
    pub label: Label,
    pub confidence: f64,
    pub raw_score: f64,
    /// Rules that fired, in evaluation order.
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ModalityScore {
    pub fn neutral(modality: Modality, confidence: f64) -> Self {
        Self {
            modality,
            label: Label::Neutral,
            confidence,
            raw_score: 0.0,
            reasons: Vec::new(),
        }
    }

    /// Direction times confidence: the contribution of a non-scalar modality.
    pub fn directional_value(&self) -> f64 {
        self.label.sign() * self.confidence
    }
}

pub trait ModalityScorer: Send + Sync {
    fn modality(&self) -> Modality;

    fn score(&self, features: &FeatureSet) -> ModalityScore;
}

// =============================================================================
// Table evaluator
// =============================================================================

#[derive(Default)]
struct Tally {
    sum: f64,
    weight: f64,
    reasons: Vec<String>,
}

impl Tally {
    fn apply(&mut self, effect: Effect, reason: String) {
        match effect {
            Effect::Add(v) => self.sum += v,
            Effect::Scale(m) => self.sum *= m,
        }
        self.reasons.push(reason);
    }
}

impl ScoreTable {
    pub fn evaluate(&self, features: &FeatureSet) -> ModalityScore {
        let mut tally = Tally::default();
        for rule in self.rules {
            apply_rule(rule, features, &mut tally);
        }

        let mut raw = match self.aggregation {
            Aggregation::Sum => tally.sum,
            Aggregation::WeightedMean if tally.weight > 0.0 => tally.sum / tally.weight,
            Aggregation::WeightedMean => 0.0,
        };
        if let Some(limit) = self.clamp {
            raw = raw.clamp(-limit, limit);
        }
        if !raw.is_finite() {
            raw = 0.0;
        }

        let label = if raw > self.dead_zone {
            self.labels.0
        } else if raw < -self.dead_zone {
            self.labels.1
        } else {
            Label::Neutral
        };
        let confidence = self.confidence.confidence(raw, label != Label::Neutral);

        ModalityScore {
            modality: self.modality,
            label,
            confidence,
            raw_score: raw,
            reasons: tally.reasons,
        }
    }
}

fn apply_rule(rule: &Rule, features: &FeatureSet, tally: &mut Tally) {
    match *rule {
        Rule::Bands { feature, bands } => {
            let Some(v) = features.observed_number(feature) else {
                return;
            };
            if let Some(band) = bands.iter().find(|b| b.when.matches(v)) {
                tally.apply(band.effect, format!("{feature}={v:.4} {} ({})", band.when, band.effect));
            }
        }
        Rule::Sign { feature, weight } => {
            let Some(v) = features.observed_number(feature) else {
                return;
            };
            if v != 0.0 {
                let effect = Effect::Add(weight * v.signum());
                tally.apply(effect, format!("{feature}={v:.4} ({effect})"));
            }
        }
        Rule::ScaledSign {
            feature,
            reference,
            factor,
            cap,
            weight,
        } => {
            let (Some(v), Some(r)) = (features.observed_number(feature), features.observed_number(reference)) else {
                return;
            };
            if v == 0.0 || r <= 0.0 {
                return;
            }
            let strength = (v.abs() / r * factor).min(cap);
            let effect = Effect::Add(weight * strength * v.signum());
            tally.apply(effect, format!("{feature}={v:.4} strength {strength:.3} ({effect})"));
        }
        Rule::CrossPair {
            fast,
            slow,
            upper,
            lower,
            extreme,
            cross,
        } => {
            let (Some(k), Some(d)) = (features.observed_number(fast), features.observed_number(slow)) else {
                return;
            };
            let (effect, why) = if k > upper && d > upper {
                (Effect::Add(extreme), "both overbought")
            } else if k < lower && d < lower {
                (Effect::Add(-extreme), "both oversold")
            } else if k > d {
                (Effect::Add(cross), "bullish cross")
            } else if k < d {
                (Effect::Add(-cross), "bearish cross")
            } else {
                return;
            };
            tally.apply(effect, format!("{fast}={k:.2} {slow}={d:.2} {why} ({effect})"));
        }
        Rule::Tag { feature, cases } => {
            let Some(tag) = features.observed_tag(feature) else {
                return;
            };
            if let Some((_, effect)) = cases.iter().find(|(name, _)| *name == tag) {
                tally.apply(*effect, format!("{feature}={tag} ({effect})"));
            }
        }
        Rule::Linear { feature, weight } => {
            let Some(v) = features.observed_number(feature) else {
                return;
            };
            tally.sum += v * weight;
            tally.weight += weight;
            tally.reasons.push(format!("{feature}={v:.4} w={weight}"));
        }
    }
}

/// Scorer backed by one of the static rule tables.
#[derive(Debug, Clone, Copy)]
pub struct TableScorer {
    table: &'static ScoreTable,
}

impl TableScorer {
    pub fn new(table: &'static ScoreTable) -> Self {
        Self { table }
    }

    pub fn for_modality(modality: Modality) -> Self {
        Self::new(tables::table_for(modality))
    }

    pub fn table(&self) -> &'static ScoreTable {
        self.table
    }

    /// Score reported for a modality with no usable data.
    pub fn neutral(&self) -> ModalityScore {
        ModalityScore::neutral(self.table.modality, self.table.confidence.confidence(0.0, false))
    }
}

impl ModalityScorer for TableScorer {
    fn modality(&self) -> Modality {
        self.table.modality
    }

    fn score(&self, features: &FeatureSet) -> ModalityScore {
        self.table.evaluate(features)
    }
}
