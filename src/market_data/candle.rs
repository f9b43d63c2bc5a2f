use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar. `open_time` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Reject structurally impossible price series.
///
/// Non-finite values pass through on purpose: an indicator whose window holds
/// one returns `None` and the dependent features fall back to their defaults.
pub fn validate_series(candles: &[Candle]) -> FeatureResult<()> {
    for (index, c) in candles.iter().enumerate() {
        for value in [c.open, c.high, c.low, c.close] {
            if value < 0.0 {
                return Err(FeatureError::NegativePrice { index, value });
            }
        }
        if c.high < c.low {
            return Err(FeatureError::InvertedRange {
                index,
                high: c.high,
                low: c.low,
            });
        }
        if c.volume < 0.0 {
            return Err(FeatureError::NegativeQuantity {
                field: "volume",
                index,
                value: c.volume,
            });
        }
        if index > 0 && c.open_time <= candles[index - 1].open_time {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}
