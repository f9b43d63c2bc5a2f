// =============================================================================
// Aggregator — confidence/magnitude weighted averaging
// =============================================================================
//
//   aggregate = Σ value·|weight| / Σ |weight|
//
// Used twice for sentiment: per-document scores into one bucket score, and
// the recent/slow bucket scores into the composite.
//
// Terms are sorted before summation so the result does not depend on input
// order, not even in the last ulp.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedValue {
    pub value: f64,
    pub weight: f64,
}

impl WeightedValue {
    pub fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }
}

/// Weighted mean of `sub_scores`. Returns 0.0 for empty input, an all-zero
/// weight vector, or entries that are all non-finite.
pub fn aggregate(sub_scores: &[WeightedValue]) -> f64 {
    let mut terms = Vec::with_capacity(sub_scores.len());
    let mut weights = Vec::with_capacity(sub_scores.len());
    for s in sub_scores {
        if !(s.value.is_finite() && s.weight.is_finite()) {
            continue;
        }
        let w = s.weight.abs();
        terms.push(s.value * w);
        weights.push(w);
    }

    terms.sort_by(f64::total_cmp);
    weights.sort_by(f64::total_cmp);

    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let result = terms.iter().sum::<f64>() / total;
    if result.is_finite() {
        result
    } else {
        0.0
    }
}

/// Relative weight of the recent and slow sentiment buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyWeights {
    pub recent: f64,
    pub slow: f64,
}

impl Default for RecencyWeights {
    fn default() -> Self {
        Self {
            recent: 0.75,
            slow: 0.25,
        }
    }
}

/// Recent/slow bucket scores and their weighted composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub recent: f64,
    pub slow: f64,
    pub composite: f64,
}

impl CompositeScore {
    pub fn from_buckets(recent: f64, slow: f64, weights: RecencyWeights) -> Self {
        let composite = aggregate(&[
            WeightedValue::new(recent, weights.recent),
            WeightedValue::new(slow, weights.slow),
        ]);
        Self {
            recent,
            slow,
            composite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_and_zero_weights_are_neutral() {
        assert_eq!(aggregate(&[]), 0.0);
        assert_eq!(
            aggregate(&[WeightedValue::new(0.5, 0.0), WeightedValue::new(-0.5, 0.0)]),
            0.0
        );
    }

    #[test]
    fn uses_absolute_weights() {
        let v = [WeightedValue::new(0.5, -0.5), WeightedValue::new(-0.5, 0.5)];
        assert_abs_diff_eq!(aggregate(&v), 0.0);
        let v = [WeightedValue::new(0.5, 0.5), WeightedValue::new(0.0, 0.0), WeightedValue::new(-0.5, 0.5)];
        assert_abs_diff_eq!(aggregate(&v), 0.0);
        let v = [WeightedValue::new(0.5, 0.5), WeightedValue::new(0.5, 0.5), WeightedValue::new(-0.5, 0.5)];
        assert_abs_diff_eq!(aggregate(&v), 0.5 / 3.0, epsilon = 1e-15);
    }

    #[test]
    fn permutation_invariant() {
        let base = vec![
            WeightedValue::new(0.1, 0.3),
            WeightedValue::new(-0.7, 0.9),
            WeightedValue::new(0.33, 0.01),
            WeightedValue::new(0.5, 0.5),
            WeightedValue::new(-0.2, 1e-9),
        ];
        let expected = aggregate(&base);
        let mut rotated = base.clone();
        for _ in 0..base.len() {
            rotated.rotate_left(1);
            assert_eq!(aggregate(&rotated), expected);
        }
        let mut reversed = base;
        reversed.reverse();
        assert_eq!(aggregate(&reversed), expected);
    }

    #[test]
    fn non_finite_entries_are_skipped() {
        let v = [WeightedValue::new(f64::NAN, 1.0), WeightedValue::new(0.4, f64::INFINITY), WeightedValue::new(0.2, 1.0)];
        assert_abs_diff_eq!(aggregate(&v), 0.2);
    }

    #[test]
    fn composite_weights_recent_three_to_one() {
        let c = CompositeScore::from_buckets(0.4, -0.4, RecencyWeights::default());
        assert_abs_diff_eq!(c.composite, 0.75 * 0.4 - 0.25 * 0.4, epsilon = 1e-15);
    }
}
