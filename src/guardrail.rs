// =============================================================================
// Guardrail — minimum-confidence abstention veto
// =============================================================================
//
// Two states, no memory between runs:
//
//   PassThrough    conf_raw >= threshold, direction_raw is kept
//   ForcedAbstain  conf_raw <  threshold, direction becomes Abstain
//
// Confidence is reported unchanged in both states.

use serde::{Deserialize, Serialize};

use crate::fusion::FusedSignal;
use crate::types::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailState {
    PassThrough,
    ForcedAbstain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub state: GuardrailState,
    pub direction_final: Direction,
    pub conf_final: f64,
    pub abstain_threshold: f64,
}

pub fn apply(fused: &FusedSignal, abstain_threshold: f64) -> GuardrailVerdict {
    let conf = fused.conf_raw;
    let state = if conf.is_nan() || conf < abstain_threshold {
        GuardrailState::ForcedAbstain
    } else {
        GuardrailState::PassThrough
    };
    let direction_final = match state {
        GuardrailState::PassThrough => fused.direction_raw,
        GuardrailState::ForcedAbstain => Direction::Abstain,
    };
    GuardrailVerdict {
        state,
        direction_final,
        conf_final: conf,
        abstain_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fused(direction: Direction, conf: f64) -> FusedSignal {
        FusedSignal {
            direction_raw: direction,
            conf_raw: conf,
            fused_score: 0.1,
            undamped_score: 0.1,
            disagreement: false,
            agreement_bonus_applied: false,
            component_scores: BTreeMap::new(),
        }
    }

    #[test]
    fn low_confidence_forces_abstain_and_keeps_confidence() {
        let v = apply(&fused(Direction::Up, 0.45), 0.50);
        assert_eq!(v.state, GuardrailState::ForcedAbstain);
        assert_eq!(v.direction_final, Direction::Abstain);
        assert_eq!(v.conf_final, 0.45);
    }

    #[test]
    fn confident_signal_passes_through() {
        let v = apply(&fused(Direction::Down, 0.62), 0.50);
        assert_eq!(v.state, GuardrailState::PassThrough);
        assert_eq!(v.direction_final, Direction::Down);
        assert_eq!(v.conf_final, 0.62);
    }

    #[test]
    fn threshold_equal_to_confidence_passes() {
        let v = apply(&fused(Direction::Up, 0.5), 0.5);
        assert_eq!(v.direction_final, Direction::Up);
    }

    #[test]
    fn raising_threshold_only_moves_toward_abstain() {
        for direction in [Direction::Up, Direction::Down, Direction::Abstain] {
            let f = fused(direction, 0.55);
            let mut abstained = false;
            for step in 0..=20 {
                let v = apply(&f, step as f64 * 0.05);
                if abstained {
                    assert_eq!(v.direction_final, Direction::Abstain);
                }
                abstained |= v.direction_final == Direction::Abstain;
            }
            assert!(abstained);
        }
    }
}
