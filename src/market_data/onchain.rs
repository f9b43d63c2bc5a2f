// =============================================================================
// On-chain readings (mempool, fees, chain tip, network statistics)
// =============================================================================
//
// Every metric is optional: public explorers routinely omit fields, and a
// missing metric must degrade to the neutral default rather than fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnChainReading {
    pub timestamp: DateTime<Utc>,

    // --- Mempool ------------------------------------------------------------
    #[serde(default)]
    pub mempool_count: Option<f64>,
    #[serde(default)]
    pub mempool_vsize: Option<f64>,

    // --- Fee estimates (sat/vB) --------------------------------------------
    #[serde(default)]
    pub fee_fastest: Option<f64>,
    #[serde(default)]
    pub fee_30min: Option<f64>,
    #[serde(default)]
    pub fee_economy: Option<f64>,

    // --- Chain tip -----------------------------------------------------------
    #[serde(default)]
    pub tip_height: Option<f64>,
    #[serde(default)]
    pub tip_size: Option<f64>,
    #[serde(default)]
    pub tip_weight: Option<f64>,

    // --- Network statistics (24h) ------------------------------------------
    #[serde(default)]
    pub network_transactions: Option<f64>,
    #[serde(default)]
    pub avg_tx_value_usd: Option<f64>,
}

impl OnChainReading {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }
}

pub fn validate_onchain(readings: &[OnChainReading]) -> FeatureResult<()> {
    for (index, r) in readings.iter().enumerate() {
        let counters = [
            ("mempool_count", r.mempool_count),
            ("mempool_vsize", r.mempool_vsize),
            ("fee_fastest", r.fee_fastest),
            ("fee_30min", r.fee_30min),
            ("fee_economy", r.fee_economy),
            ("tip_size", r.tip_size),
            ("tip_weight", r.tip_weight),
            ("network_transactions", r.network_transactions),
            ("avg_tx_value_usd", r.avg_tx_value_usd),
        ];
        for (field, value) in counters {
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(FeatureError::NegativeQuantity {
                        field,
                        index,
                        value: v,
                    });
                }
            }
        }
        if index > 0 && r.timestamp <= readings[index - 1].timestamp {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}
