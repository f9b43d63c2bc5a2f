// =============================================================================
// Fusion Engine — weighted multi-modality decision
// =============================================================================
//
// Each modality contributes one signed value:
//
//   directional modality:  label sign (+1 / 0 / -1) x confidence
//   scalar modality:       tanh(gain x raw_score)
//
//   fused = Σ weight x value
//
// When the non-zero contributions point in different directions the fused
// score is damped by (1 - disagreement_penalty).
//
// Direction and confidence are decided separately:
//
//   direction:  fused > +threshold => Up, fused < -threshold => Down, else Abstain
//   confidence: clamp(base + min(|fused|, cap) + agreement bonus, min, max)
//
// The agreement bonus needs at least two non-zero contributions, all of the
// same sign. A modality without a score contributes 0 and keeps its weight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::scoring::ModalityScore;
use crate::types::{Direction, Modality};

/// Tolerance for the "weights sum to one" check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// =============================================================================
// Parameters
// =============================================================================

fn default_direction_threshold() -> f64 {
    0.015
}

fn default_base_confidence() -> f64 {
    0.25
}

fn default_strength_cap() -> f64 {
    0.50
}

fn default_agreement_bonus() -> f64 {
    0.15
}

fn default_min_confidence() -> f64 {
    0.20
}

fn default_max_confidence() -> f64 {
    0.80
}

fn default_sentiment_gain() -> f64 {
    2.0
}

/// Thresholds and confidence shape of the fusion stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    /// |fused| must exceed this to produce Up or Down.
    #[serde(default = "default_direction_threshold")]
    pub direction_threshold: f64,

    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    /// Largest |fused| credited to confidence.
    #[serde(default = "default_strength_cap")]
    pub strength_cap: f64,

    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    /// Gain inside tanh for scalar modalities.
    #[serde(default = "default_sentiment_gain")]
    pub sentiment_gain: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            direction_threshold: default_direction_threshold(),
            base_confidence: default_base_confidence(),
            strength_cap: default_strength_cap(),
            agreement_bonus: default_agreement_bonus(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            sentiment_gain: default_sentiment_gain(),
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("fusion.base_confidence", self.base_confidence),
            ("fusion.strength_cap", self.strength_cap),
            ("fusion.agreement_bonus", self.agreement_bonus),
            ("fusion.min_confidence", self.min_confidence),
            ("fusion.max_confidence", self.max_confidence),
            ("fusion.direction_threshold", self.direction_threshold),
        ] {
            check_unit(field, value)?;
        }
        if self.min_confidence > self.max_confidence {
            return Err(ConfigError::InvertedConfidenceBand {
                min: self.min_confidence,
                max: self.max_confidence,
            });
        }
        if !(self.sentiment_gain.is_finite() && self.sentiment_gain > 0.0) {
            return Err(ConfigError::InvalidField {
                field: "fusion.sentiment_gain",
                reason: format!("must be positive, got {}", self.sentiment_gain),
            });
        }
        Ok(())
    }
}

pub(crate) fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

/// Check a per-modality weight map: no negative or non-finite weight, at
/// least one positive weight, positive weights summing to one.
pub fn validate_weights(weights: &BTreeMap<Modality, f64>) -> Result<(), ConfigError> {
    for (&modality, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::InvalidWeight { modality, weight });
        }
    }
    let active: Vec<f64> = weights.values().copied().filter(|w| *w > 0.0).collect();
    if active.is_empty() {
        return Err(ConfigError::NoActiveModality);
    }
    let sum: f64 = active.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::WeightsDoNotSumToOne { sum });
    }
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

/// What one modality added to the fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityContribution {
    pub modality: Modality,
    pub weight: f64,
    /// Signed value before weighting.
    pub value: f64,
    /// weight x value
    pub contribution: f64,
    /// False when the modality had no score this run.
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSignal {
    pub direction_raw: Direction,
    pub conf_raw: f64,
    pub fused_score: f64,
    /// Weighted sum before the disagreement penalty.
    pub undamped_score: f64,
    pub disagreement: bool,
    pub agreement_bonus_applied: bool,
    pub component_scores: BTreeMap<Modality, ModalityContribution>,
}

// =============================================================================
// FusionEngine
// =============================================================================

#[derive(Debug, Clone)]
pub struct FusionEngine {
    weights: BTreeMap<Modality, f64>,
    disagreement_penalty: f64,
    params: FusionParams,
}

impl FusionEngine {
    pub fn new(
        weights: BTreeMap<Modality, f64>,
        disagreement_penalty: f64,
        params: FusionParams,
    ) -> Result<Self, ConfigError> {
        validate_weights(&weights)?;
        check_unit("disagree_penalty", disagreement_penalty)?;
        params.validate()?;
        Ok(Self {
            weights,
            disagreement_penalty,
            params,
        })
    }

    pub fn weight(&self, modality: Modality) -> f64 {
        self.weights.get(&modality).copied().unwrap_or(0.0)
    }

    /// Modalities with a positive weight, in `Modality::ALL` order.
    pub fn active_modalities(&self) -> Vec<Modality> {
        Modality::ALL.into_iter().filter(|m| self.weight(*m) > 0.0).collect()
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    pub fn fuse(&self, scores: &BTreeMap<Modality, ModalityScore>) -> FusedSignal {
        fuse(scores, &self.weights, self.disagreement_penalty, &self.params)
    }
}

/// Signed value a modality score brings into fusion.
pub fn signed_value(score: &ModalityScore, params: &FusionParams) -> f64 {
    let v = if score.modality.is_scalar() {
        (params.sentiment_gain * score.raw_score).tanh()
    } else {
        score.directional_value()
    };
    finite_or_zero(v)
}

pub fn fuse(
    scores: &BTreeMap<Modality, ModalityScore>,
    weights: &BTreeMap<Modality, f64>,
    disagreement_penalty: f64,
    params: &FusionParams,
) -> FusedSignal {
    let mut component_scores = BTreeMap::new();
    let mut undamped = 0.0;
    let (mut positive, mut negative) = (0usize, 0usize);

    for (&modality, &weight) in weights.iter().filter(|(_, w)| **w > 0.0) {
        let score = scores.get(&modality);
        let value = score.map(|s| signed_value(s, params)).unwrap_or(0.0);
        let contribution = finite_or_zero(weight * value);

        if contribution > 0.0 {
            positive += 1;
        } else if contribution < 0.0 {
            negative += 1;
        }
        undamped += contribution;

        component_scores.insert(
            modality,
            ModalityContribution {
                modality,
                weight,
                value,
                contribution,
                present: score.is_some(),
            },
        );
    }

    let undamped = finite_or_zero(undamped);
    let disagreement = positive > 0 && negative > 0;
    let fused = if disagreement {
        undamped * (1.0 - disagreement_penalty)
    } else {
        undamped
    };

    let direction_raw = if fused > params.direction_threshold {
        Direction::Up
    } else if fused < -params.direction_threshold {
        Direction::Down
    } else {
        Direction::Abstain
    };

    let agreement = !disagreement && positive + negative >= 2;
    let bonus = if agreement { params.agreement_bonus } else { 0.0 };
    let conf_raw = (params.base_confidence + fused.abs().min(params.strength_cap) + bonus)
        .clamp(params.min_confidence, params.max_confidence);

    debug!(
        fused,
        undamped,
        disagreement,
        agreement,
        conf_raw,
        direction = %direction_raw,
        "fusion complete"
    );

    FusedSignal {
        direction_raw,
        conf_raw,
        fused_score: fused,
        undamped_score: undamped,
        disagreement,
        agreement_bonus_applied: agreement,
        component_scores,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;
    use approx::assert_abs_diff_eq;

    fn weights() -> BTreeMap<Modality, f64> {
        BTreeMap::from([(Modality::Technical, 0.6), (Modality::Sentiment, 0.4)])
    }

    fn ta(label: Label, confidence: f64) -> ModalityScore {
        ModalityScore {
            modality: Modality::Technical,
            label,
            confidence,
            raw_score: label.sign() * 0.7,
            reasons: vec![],
        }
    }

    fn sentiment(raw: f64) -> ModalityScore {
        let label = if raw > 0.05 {
            Label::Positive
        } else if raw < -0.05 {
            Label::Negative
        } else {
            Label::Neutral
        };
        ModalityScore {
            modality: Modality::Sentiment,
            label,
            confidence: 0.5,
            raw_score: raw,
            reasons: vec![],
        }
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(weights(), 0.15, FusionParams::default()).unwrap()
    }

    fn scores(list: Vec<ModalityScore>) -> BTreeMap<Modality, ModalityScore> {
        list.into_iter().map(|s| (s.modality, s)).collect()
    }

    #[test]
    fn all_neutral_abstains_at_base_confidence() {
        let out = engine().fuse(&scores(vec![ta(Label::Neutral, 0.5), sentiment(0.0)]));
        assert_eq!(out.fused_score, 0.0);
        assert_eq!(out.direction_raw, Direction::Abstain);
        assert_abs_diff_eq!(out.conf_raw, 0.25);
        assert!(!out.disagreement);
        assert!(!out.agreement_bonus_applied);
    }

    #[test]
    fn agreeing_modalities_go_up_with_bonus() {
        let out = engine().fuse(&scores(vec![ta(Label::Bullish, 0.68), sentiment(0.3)]));
        let expected = 0.6 * 0.68 + 0.4 * (0.6_f64).tanh();
        assert_abs_diff_eq!(out.fused_score, expected, epsilon = 1e-12);
        assert_eq!(out.direction_raw, Direction::Up);
        assert!(out.agreement_bonus_applied);
        // 0.25 + 0.5 + 0.15 clamps to the 0.8 ceiling.
        assert_abs_diff_eq!(out.conf_raw, 0.8);
    }

    #[test]
    fn disagreement_damps_the_fused_score() {
        let out = engine().fuse(&scores(vec![ta(Label::Bullish, 0.68), sentiment(-0.3)]));
        let undamped = 0.6 * 0.68 - 0.4 * (0.6_f64).tanh();
        assert!(out.disagreement);
        assert_abs_diff_eq!(out.undamped_score, undamped, epsilon = 1e-12);
        assert_abs_diff_eq!(out.fused_score, undamped * 0.85, epsilon = 1e-12);
        assert!(out.fused_score.abs() < out.undamped_score.abs());
        assert!(!out.agreement_bonus_applied);
        assert_abs_diff_eq!(out.conf_raw, 0.25 + undamped * 0.85, epsilon = 1e-12);
    }

    #[test]
    fn absent_modality_keeps_its_weight() {
        let out = engine().fuse(&scores(vec![ta(Label::Bearish, 0.5)]));
        assert_abs_diff_eq!(out.fused_score, -0.3, epsilon = 1e-12);
        assert_eq!(out.direction_raw, Direction::Down);
        let s = &out.component_scores[&Modality::Sentiment];
        assert!(!s.present);
        assert_eq!(s.weight, 0.4);
        assert_eq!(s.contribution, 0.0);
        // A lone contribution earns no agreement bonus.
        assert_abs_diff_eq!(out.conf_raw, 0.55, epsilon = 1e-12);
    }

    #[test]
    fn inactive_modalities_are_ignored() {
        let mut list = vec![ta(Label::Bullish, 0.6), sentiment(0.2)];
        list.push(ModalityScore {
            modality: Modality::OrderBook,
            label: Label::Bearish,
            confidence: 0.9,
            raw_score: -1.0,
            reasons: vec![],
        });
        let out = engine().fuse(&scores(list));
        assert!(!out.component_scores.contains_key(&Modality::OrderBook));
        assert!(!out.disagreement);
    }

    #[test]
    fn non_finite_scores_are_sanitized() {
        let mut s = sentiment(0.0);
        s.raw_score = f64::NAN;
        let mut t = ta(Label::Bullish, f64::INFINITY);
        t.raw_score = f64::INFINITY;
        let out = engine().fuse(&scores(vec![t, s]));
        assert!(out.fused_score.is_finite());
        assert!(out.conf_raw.is_finite());
        assert_eq!(out.direction_raw, Direction::Abstain);
    }

    #[test]
    fn confidence_stays_in_band() {
        let e = engine();
        for c in [0.0, 0.1, 0.5, 0.9, 1.0] {
            for raw in [-1e6, -0.5, 0.0, 0.5, 1e6] {
                for label in [Label::Bullish, Label::Bearish, Label::Neutral] {
                    let out = e.fuse(&scores(vec![ta(label, c), sentiment(raw)]));
                    assert!((0.2..=0.8).contains(&out.conf_raw), "conf {}", out.conf_raw);
                }
            }
        }
    }

    #[test]
    fn weight_validation() {
        assert!(validate_weights(&weights()).is_ok());
        let bad = BTreeMap::from([(Modality::Technical, 0.7), (Modality::Sentiment, 0.4)]);
        assert!(matches!(validate_weights(&bad), Err(ConfigError::WeightsDoNotSumToOne { .. })));
        let negative = BTreeMap::from([(Modality::Technical, 1.2), (Modality::Sentiment, -0.2)]);
        assert!(matches!(validate_weights(&negative), Err(ConfigError::InvalidWeight { .. })));
        let inactive = BTreeMap::from([(Modality::Technical, 0.0)]);
        assert_eq!(validate_weights(&inactive), Err(ConfigError::NoActiveModality));
    }

    #[test]
    fn engine_rejects_bad_penalty_and_band() {
        assert!(FusionEngine::new(weights(), 1.5, FusionParams::default()).is_err());
        let params = FusionParams {
            min_confidence: 0.9,
            max_confidence: 0.5,
            ..FusionParams::default()
        };
        assert!(matches!(
            FusionEngine::new(weights(), 0.15, params),
            Err(ConfigError::InvertedConfidenceBand { .. })
        ));
    }

    #[test]
    fn active_modalities_follow_canonical_order() {
        assert_eq!(engine().active_modalities(), vec![Modality::Technical, Modality::Sentiment]);
    }
}
