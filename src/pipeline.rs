// =============================================================================
// Signal Pipeline — one run from observations to a FinalSignal
// =============================================================================
//
//   ObservationBundle
//     -> per modality: FeatureEngine -> TableScorer      (independent branches)
//     -> FusionEngine                                    (waits for every branch)
//     -> Guardrail
//     -> FinalSignal
//
// Branch outcomes:
//   Ok      features built and scored, the score enters fusion
//   Absent  no observations; neutral defaults are reported, nothing enters fusion
//   Failed  malformed observations (or a branch task that died); same as Absent
//           for fusion, with the reason kept in the report
//
// A run always yields exactly one FinalSignal. Only configuration problems
// and a concurrent run for the same key stop a run from starting.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::features::{
    self, DerivativesEngine, DerivativesInput, FeatureEngine, FeatureSet, OnChainEngine, OrderBookEngine, OrderBookInput,
    SentimentBreakdown, SentimentEngine, SentimentInput, TechnicalEngine, WindowSpec,
};
use crate::fusion::FusionEngine;
use crate::guardrail;
use crate::market_data::{
    Candle, FundingReading, FuturesReading, NewsDocument, OnChainReading, OrderBookSnapshot, Trade,
};
use crate::run_guard::{RunGuard, RunPermit};
use crate::runtime_config::PipelineConfig;
use crate::scoring::{ModalityScore, ModalityScorer, TableScorer};
use crate::sentiment::SentimentClassifier;
use crate::signal_record::{run_key, FinalSignal, ModalityReport, ModalityStatus, RunContext};
use crate::types::Modality;

// =============================================================================
// Input
// =============================================================================

/// Everything the collectors gathered for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationBundle {
    /// Run time: reference for recency windows and the signal timestamp.
    pub as_of: DateTime<Utc>,
    /// Spot price; falls back to the last candle close.
    #[serde(default)]
    pub spot: Option<f64>,
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub news: Vec<NewsDocument>,
    #[serde(default)]
    pub futures: Vec<FuturesReading>,
    #[serde(default)]
    pub funding: Vec<FundingReading>,
    #[serde(default)]
    pub onchain: Vec<OnChainReading>,
    #[serde(default)]
    pub orderbook: Vec<OrderBookSnapshot>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl ObservationBundle {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            ..Self::default()
        }
    }

    /// True when the collector for `modality` delivered nothing usable.
    /// Trades are batched between book snapshots, so trades alone do not
    /// make the order book present.
    pub fn is_empty_for(&self, modality: Modality) -> bool {
        match modality {
            Modality::Technical => self.candles.is_empty(),
            Modality::Sentiment => self.news.is_empty(),
            Modality::Derivatives => self.futures.is_empty() && self.funding.is_empty(),
            Modality::OnChain => self.onchain.is_empty(),
            Modality::OrderBook => self.orderbook.is_empty(),
        }
    }

    pub fn spot_price(&self) -> f64 {
        self.spot
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| self.candles.last().map(|c| c.close).filter(|p| p.is_finite()))
            .unwrap_or(0.0)
    }
}

// =============================================================================
// Branch outcome
// =============================================================================

#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub modality: Modality,
    pub status: ModalityStatus,
    pub features: FeatureSet,
    pub score: Option<ModalityScore>,
    pub sentiment: Option<SentimentBreakdown>,
}

impl BranchOutcome {
    fn failed(modality: Modality, reason: String) -> Self {
        Self {
            modality,
            status: ModalityStatus::Failed { reason },
            features: FeatureSet::from_schema(features::schema_for(modality)),
            score: None,
            sentiment: None,
        }
    }
}

// =============================================================================
// SignalPipeline
// =============================================================================

pub struct SignalPipeline {
    config: PipelineConfig,
    window: WindowSpec,
    sentiment: SentimentEngine,
    fusion: FusionEngine,
    guard: RunGuard,
}

impl SignalPipeline {
    /// Validate `config` and build the stage engines. The config is fixed
    /// for the lifetime of the pipeline.
    pub fn new(config: PipelineConfig, classifier: Arc<dyn SentimentClassifier>) -> Result<Self, PipelineError> {
        config.validate()?;
        let fusion = FusionEngine::new(config.fusion_weights.clone(), config.disagree_penalty, config.fusion)?;
        let sentiment = SentimentEngine::new(classifier, config.sentiment_settings());
        info!(
            symbol = %config.symbol,
            horizon_hours = config.prediction_hours,
            active = ?fusion.active_modalities(),
            "signal pipeline ready"
        );
        Ok(Self {
            window: config.window(),
            config,
            sentiment,
            fusion,
            guard: RunGuard::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_guard(&self) -> &RunGuard {
        &self.guard
    }

    pub fn run_key(&self) -> String {
        run_key(&self.config.symbol, self.config.prediction_hours)
    }

    /// Run every branch on the calling thread, in `Modality::ALL` order.
    pub fn run(&self, bundle: &ObservationBundle) -> Result<FinalSignal, PipelineError> {
        let permit = self.guard.try_acquire(self.run_key())?;
        let outcomes = Modality::ALL.iter().map(|&m| self.evaluate(m, bundle)).collect();
        Ok(self.finish(bundle, outcomes, permit))
    }

    /// Run each branch on the blocking pool and fuse once all have finished.
    /// A branch task that dies is reported as failed; it never blocks fusion.
    pub async fn run_concurrent(self: &Arc<Self>, bundle: Arc<ObservationBundle>) -> Result<FinalSignal, PipelineError> {
        let permit = self.guard.try_acquire(self.run_key())?;

        let handles = Modality::ALL.map(|modality| {
            let pipeline = Arc::clone(self);
            let bundle = Arc::clone(&bundle);
            tokio::task::spawn_blocking(move || pipeline.evaluate(modality, &bundle))
        });

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(Modality::ALL)
            .map(|(joined, modality)| {
                joined.unwrap_or_else(|e| {
                    warn!(%modality, error = %e, "modality branch did not complete");
                    BranchOutcome::failed(modality, format!("branch task failed: {e}"))
                })
            })
            .collect();

        Ok(self.finish(&bundle, outcomes, permit))
    }

    /// Feature Engine and Scorer for one modality.
    pub fn evaluate(&self, modality: Modality, bundle: &ObservationBundle) -> BranchOutcome {
        let empty = bundle.is_empty_for(modality);
        match modality {
            Modality::Technical => self.branch(&TechnicalEngine, bundle.candles.as_slice(), empty),
            Modality::Sentiment => self.sentiment_branch(bundle, empty),
            Modality::Derivatives => self.branch(
                &DerivativesEngine,
                DerivativesInput {
                    futures: &bundle.futures,
                    funding: &bundle.funding,
                },
                empty,
            ),
            Modality::OnChain => self.branch(&OnChainEngine, bundle.onchain.as_slice(), empty),
            Modality::OrderBook => {
                if empty && !bundle.trades.is_empty() {
                    debug!(trades = bundle.trades.len(), "order book: trades without snapshots ignored");
                }
                self.branch(
                    &OrderBookEngine,
                    OrderBookInput {
                        snapshots: &bundle.orderbook,
                        trades: &bundle.trades,
                    },
                    empty,
                )
            }
        }
    }

    fn branch<E: FeatureEngine>(&self, engine: &E, input: E::Input<'_>, empty: bool) -> BranchOutcome {
        let modality = engine.modality();
        let scorer = TableScorer::for_modality(modality);

        if empty {
            debug!(%modality, "no observations, reporting neutral defaults");
            return BranchOutcome {
                modality,
                status: ModalityStatus::Absent,
                features: FeatureSet::from_schema(engine.schema()),
                score: Some(scorer.neutral()),
                sentiment: None,
            };
        }

        match engine.build_features(input, &self.window) {
            Ok(features) => {
                let score = scorer.score(&features);
                debug!(
                    %modality,
                    label = %score.label,
                    confidence = score.confidence,
                    raw = score.raw_score,
                    defaulted = features.defaulted().count(),
                    "modality scored"
                );
                BranchOutcome {
                    modality,
                    status: ModalityStatus::Ok,
                    features,
                    score: Some(score),
                    sentiment: None,
                }
            }
            Err(e) => {
                warn!(%modality, error = %e, "malformed observations, modality excluded from fusion");
                BranchOutcome::failed(modality, e.to_string())
            }
        }
    }

    fn sentiment_branch(&self, bundle: &ObservationBundle, empty: bool) -> BranchOutcome {
        let scorer = TableScorer::for_modality(Modality::Sentiment);
        if empty {
            debug!("no documents, reporting neutral sentiment");
            return BranchOutcome {
                modality: Modality::Sentiment,
                status: ModalityStatus::Absent,
                features: FeatureSet::from_schema(self.sentiment.schema()),
                score: Some(scorer.neutral()),
                sentiment: None,
            };
        }

        let analysis = self.sentiment.analyze(SentimentInput {
            documents: &bundle.news,
            as_of: bundle.as_of,
        });
        let score = scorer.score(&analysis.features);
        debug!(
            label = %score.label,
            composite = analysis.breakdown.scores.composite,
            policy = ?analysis.breakdown.policy,
            "sentiment scored"
        );
        BranchOutcome {
            modality: Modality::Sentiment,
            status: ModalityStatus::Ok,
            features: analysis.features,
            score: Some(score),
            sentiment: Some(analysis.breakdown),
        }
    }

    /// Fusion, Guardrail and the record. The permit is released only after
    /// the FinalSignal exists.
    fn finish(&self, bundle: &ObservationBundle, outcomes: Vec<BranchOutcome>, permit: RunPermit) -> FinalSignal {
        let mut scores = BTreeMap::new();
        let mut reports = Vec::with_capacity(outcomes.len());
        let mut sentiment = None;

        for outcome in outcomes {
            let weight = self.fusion.weight(outcome.modality);
            if outcome.status.is_ok() {
                if let Some(score) = &outcome.score {
                    scores.insert(outcome.modality, score.clone());
                }
            } else if weight > 0.0 {
                warn!(modality = %outcome.modality, status = %outcome.status, weight, "active modality missing from fusion");
            }
            if outcome.sentiment.is_some() {
                sentiment = outcome.sentiment;
            }
            reports.push(ModalityReport {
                modality: outcome.modality,
                status: outcome.status,
                weight,
                features: outcome.features,
                score: outcome.score,
            });
        }

        let fused = self.fusion.fuse(&scores);
        let verdict = guardrail::apply(&fused, self.config.abstain_conf_threshold);

        let signal = FinalSignal::new(
            RunContext {
                symbol: self.config.symbol.clone(),
                horizon_hours: self.config.prediction_hours,
                spot: bundle.spot_price(),
                timestamp: bundle.as_of,
            },
            fused,
            verdict,
            reports,
            sentiment,
        );

        info!(
            key = permit.key(),
            run_id = %signal.run_id,
            direction = %signal.direction_final,
            direction_raw = %signal.direction_raw(),
            confidence = signal.conf_final,
            fused = signal.fused.fused_score,
            guardrail = ?signal.guardrail,
            "signal run complete"
        );
        drop(permit);
        signal
    }
}
