// =============================================================================
// Signal Record — the persisted outcome of one pipeline run
// =============================================================================
//
// A `FinalSignal` is built once per run and never modified afterwards. It
// carries the guarded decision, the fused score it came from and, per
// modality, the full feature map and score so reports can be audited.
//
// `run_id` and `content_hash` are the idempotency keys checked by the history
// log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::features::{FeatureSet, SentimentBreakdown};
use crate::fusion::FusedSignal;
use crate::guardrail::{GuardrailState, GuardrailVerdict};
use crate::scoring::ModalityScore;
use crate::types::{Direction, Modality};

/// Outcome of one modality branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModalityStatus {
    Ok,
    /// No observations were supplied; neutral defaults were reported.
    Absent,
    /// Observations were malformed or the branch did not finish.
    Failed { reason: String },
}

impl ModalityStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for ModalityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Absent => write!(f, "absent"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityReport {
    pub modality: Modality,
    #[serde(flatten)]
    pub status: ModalityStatus,
    pub weight: f64,
    pub features: FeatureSet,
    /// `None` unless the branch produced a score that entered fusion.
    #[serde(default)]
    pub score: Option<ModalityScore>,
}

/// Identity of a run: what was decided, for whom, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub symbol: String,
    pub horizon_hours: u32,
    pub spot: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSignal {
    pub run_id: Uuid,
    pub content_hash: String,
    pub symbol: String,
    pub horizon_hours: u32,
    pub spot: f64,
    pub timestamp: DateTime<Utc>,

    pub direction_final: Direction,
    pub conf_final: f64,
    pub guardrail: GuardrailState,
    pub abstain_threshold: f64,

    pub fused: FusedSignal,
    pub modalities: Vec<ModalityReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentBreakdown>,
}

impl FinalSignal {
    pub fn new(
        ctx: RunContext,
        fused: FusedSignal,
        verdict: GuardrailVerdict,
        modalities: Vec<ModalityReport>,
        sentiment: Option<SentimentBreakdown>,
    ) -> Self {
        let content_hash = content_hash(&ctx, &fused, &verdict);
        Self {
            run_id: Uuid::new_v4(),
            content_hash,
            symbol: ctx.symbol,
            horizon_hours: ctx.horizon_hours,
            spot: ctx.spot,
            timestamp: ctx.timestamp,
            direction_final: verdict.direction_final,
            conf_final: verdict.conf_final,
            guardrail: verdict.state,
            abstain_threshold: verdict.abstain_threshold,
            fused,
            modalities,
            sentiment,
        }
    }

    pub fn direction_raw(&self) -> Direction {
        self.fused.direction_raw
    }

    pub fn report(&self, modality: Modality) -> Option<&ModalityReport> {
        self.modalities.iter().find(|r| r.modality == modality)
    }

    /// Key under which at most one signal is current.
    pub fn run_key(&self) -> String {
        run_key(&self.symbol, self.horizon_hours)
    }
}

pub fn run_key(symbol: &str, horizon_hours: u32) -> String {
    format!("{symbol}@{horizon_hours}h")
}

/// SHA-256 over the decision and its identity. Two runs over the same
/// snapshot at the same time hash equal even though their run ids differ.
fn content_hash(ctx: &RunContext, fused: &FusedSignal, verdict: &GuardrailVerdict) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ctx.symbol.as_bytes());
    hasher.update(ctx.horizon_hours.to_be_bytes());
    hasher.update(ctx.timestamp.to_rfc3339().as_bytes());
    hasher.update(ctx.spot.to_bits().to_be_bytes());
    hasher.update(fused.fused_score.to_bits().to_be_bytes());
    hasher.update(verdict.conf_final.to_bits().to_be_bytes());
    hasher.update(verdict.direction_final.to_string().as_bytes());
    for (modality, c) in &fused.component_scores {
        hasher.update(modality.to_string().as_bytes());
        hasher.update(c.value.to_bits().to_be_bytes());
    }
    hex::encode(hasher.finalize())
}
