// =============================================================================
// Pipeline Configuration — validated settings with atomic save
// =============================================================================
//
// Every tunable of a pipeline run lives here: the symbol and horizon, the
// lookback windows, sentiment recency buckets, fusion weights and the
// guardrail threshold.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry serde defaults so that adding new fields never
// breaks loading an older config file.
//
// A config is validated once, when a pipeline is built from it, and is
// immutable for the lifetime of that pipeline.
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::RecencyWeights;
use crate::error::ConfigError;
use crate::features::sentiment::SentimentSettings;
use crate::features::WindowSpec;
use crate::fusion::{check_unit, validate_weights, FusionParams, WEIGHT_SUM_TOLERANCE};
use crate::market_data::RecencyWindows;
use crate::types::Modality;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTC/USDT".to_string()
}

fn default_prediction_hours() -> u32 {
    4
}

fn default_ta_lookback_bars() -> usize {
    72
}

fn default_momentum_samples() -> usize {
    10
}

fn default_max_samples() -> usize {
    96
}

fn default_news_recent_hours() -> u32 {
    2
}

fn default_news_slow_hours_min() -> u32 {
    6
}

fn default_news_slow_hours_max() -> u32 {
    12
}

fn default_max_news_items() -> usize {
    16
}

fn default_sentiment_recent_weight() -> f64 {
    0.75
}

fn default_sentiment_slow_weight() -> f64 {
    0.25
}

fn default_abstain_conf_threshold() -> f64 {
    0.50
}

fn default_disagree_penalty() -> f64 {
    0.15
}

fn default_fusion_weights() -> BTreeMap<Modality, f64> {
    BTreeMap::from([
        (Modality::Technical, 0.60),
        (Modality::Sentiment, 0.40),
        (Modality::Derivatives, 0.0),
        (Modality::OnChain, 0.0),
        (Modality::OrderBook, 0.0),
    ])
}

// =============================================================================
// PipelineConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    // --- Identity -----------------------------------------------------------
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Prediction horizon in hours.
    #[serde(default = "default_prediction_hours")]
    pub prediction_hours: u32,

    // --- Windows ------------------------------------------------------------
    /// Most recent price bars fed to the technical engine.
    #[serde(default = "default_ta_lookback_bars")]
    pub ta_lookback_bars: usize,

    /// Samples in momentum (mean first difference) features.
    #[serde(default = "default_momentum_samples")]
    pub momentum_samples: usize,

    /// Most recent readings/snapshots any other engine reads.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    // --- Sentiment ----------------------------------------------------------
    #[serde(default = "default_news_recent_hours")]
    pub news_recent_hours: u32,

    #[serde(default = "default_news_slow_hours_min")]
    pub news_slow_hours_min: u32,

    #[serde(default = "default_news_slow_hours_max")]
    pub news_slow_hours_max: u32,

    #[serde(default = "default_max_news_items")]
    pub max_news_items: usize,

    #[serde(default = "default_sentiment_recent_weight")]
    pub sentiment_recent_weight: f64,

    #[serde(default = "default_sentiment_slow_weight")]
    pub sentiment_slow_weight: f64,

    // --- Fusion & guardrail -------------------------------------------------
    /// Weight per modality. Zero means inactive; positive weights sum to 1.
    #[serde(default = "default_fusion_weights")]
    pub fusion_weights: BTreeMap<Modality, f64>,

    #[serde(default = "default_disagree_penalty")]
    pub disagree_penalty: f64,

    #[serde(default = "default_abstain_conf_threshold")]
    pub abstain_conf_threshold: f64,

    #[serde(default)]
    pub fusion: FusionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            prediction_hours: default_prediction_hours(),
            ta_lookback_bars: default_ta_lookback_bars(),
            momentum_samples: default_momentum_samples(),
            max_samples: default_max_samples(),
            news_recent_hours: default_news_recent_hours(),
            news_slow_hours_min: default_news_slow_hours_min(),
            news_slow_hours_max: default_news_slow_hours_max(),
            max_news_items: default_max_news_items(),
            sentiment_recent_weight: default_sentiment_recent_weight(),
            sentiment_slow_weight: default_sentiment_slow_weight(),
            fusion_weights: default_fusion_weights(),
            disagree_penalty: default_disagree_penalty(),
            abstain_conf_threshold: default_abstain_conf_threshold(),
            fusion: FusionParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn window(&self) -> WindowSpec {
        WindowSpec {
            lookback_bars: self.ta_lookback_bars,
            max_samples: self.max_samples,
            momentum_samples: self.momentum_samples,
        }
    }

    pub fn sentiment_settings(&self) -> SentimentSettings {
        SentimentSettings {
            windows: RecencyWindows {
                recent_hours: self.news_recent_hours,
                slow_min_hours: self.news_slow_hours_min,
                slow_max_hours: self.news_slow_hours_max,
            },
            weights: RecencyWeights {
                recent: self.sentiment_recent_weight,
                slow: self.sentiment_slow_weight,
            },
            max_items: self.max_news_items,
        }
    }

    pub fn weight(&self, modality: Modality) -> f64 {
        self.fusion_weights.get(&modality).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "symbol",
                reason: "must not be empty".into(),
            });
        }
        if self.prediction_hours == 0 {
            return Err(ConfigError::InvalidField {
                field: "prediction_hours",
                reason: "must be positive".into(),
            });
        }
        for (name, value) in [
            ("ta_lookback_bars", self.ta_lookback_bars),
            ("momentum_samples", self.momentum_samples),
            ("max_samples", self.max_samples),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidWindow(format!("{name} must be positive")));
            }
        }
        if self.max_news_items == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_news_items",
                reason: "must be positive".into(),
            });
        }
        if self.news_slow_hours_min >= self.news_slow_hours_max {
            return Err(ConfigError::InvalidWindow(format!(
                "news_slow_hours_min {} must be below news_slow_hours_max {}",
                self.news_slow_hours_min, self.news_slow_hours_max
            )));
        }
        if self.news_recent_hours == 0 || self.news_recent_hours > self.news_slow_hours_min {
            return Err(ConfigError::InvalidWindow(format!(
                "news_recent_hours {} must be within 1..={}",
                self.news_recent_hours, self.news_slow_hours_min
            )));
        }

        check_unit("sentiment_recent_weight", self.sentiment_recent_weight)?;
        check_unit("sentiment_slow_weight", self.sentiment_slow_weight)?;
        let recency_sum = self.sentiment_recent_weight + self.sentiment_slow_weight;
        if (recency_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::RecencyWeightsDoNotSumToOne { sum: recency_sum });
        }

        check_unit("disagree_penalty", self.disagree_penalty)?;
        check_unit("abstain_conf_threshold", self.abstain_conf_threshold)?;
        validate_weights(&self.fusion_weights)?;
        self.fusion.validate()
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// The file is parsed but not validated; validation happens when a
    /// pipeline is built from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse pipeline config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            horizon_hours = config.prediction_hours,
            "pipeline config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self).context("failed to serialise pipeline config to JSON")?;
        crate::history::write_atomic(path, &content)?;

        info!(path = %path.display(), "pipeline config saved (atomic)");
        Ok(())
    }
}
