// =============================================================================
// Futures / funding readings
// =============================================================================
//
// One reading per exchange per collection tick. Several exchanges may report
// the same timestamp; the feature engine groups readings by timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesReading {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub exchange: String,
    pub futures_price: f64,
    pub spot_price: f64,
    /// Open interest in contracts; 0.0 when the exchange did not report it.
    #[serde(default)]
    pub open_interest: f64,
    #[serde(default)]
    pub volume_24h: f64,
}

impl FuturesReading {
    /// (futures - spot) / spot, `None` when spot is not positive.
    pub fn basis(&self) -> Option<f64> {
        if self.spot_price > 0.0 && self.futures_price > 0.0 {
            Some((self.futures_price - self.spot_price) / self.spot_price)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingReading {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub exchange: String,
    /// Funding rate as a decimal (0.0001 = 0.01%).
    pub funding_rate: f64,
}

pub fn validate_futures(readings: &[FuturesReading]) -> FeatureResult<()> {
    for (index, r) in readings.iter().enumerate() {
        for value in [r.futures_price, r.spot_price] {
            if value < 0.0 {
                return Err(FeatureError::NegativePrice { index, value });
            }
        }
        if r.open_interest < 0.0 {
            return Err(FeatureError::NegativeQuantity {
                field: "open_interest",
                index,
                value: r.open_interest,
            });
        }
        if r.volume_24h < 0.0 {
            return Err(FeatureError::NegativeQuantity {
                field: "volume_24h",
                index,
                value: r.volume_24h,
            });
        }
        if index > 0 && r.timestamp < readings[index - 1].timestamp {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}

pub fn validate_funding(readings: &[FundingReading]) -> FeatureResult<()> {
    for index in 1..readings.len() {
        if readings[index].timestamp < readings[index - 1].timestamp {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(futures: f64, spot: f64) -> FuturesReading {
        FuturesReading {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            exchange: "binance".into(),
            futures_price: futures,
            spot_price: spot,
            open_interest: 1000.0,
            volume_24h: 5.0e8,
        }
    }

    #[test]
    fn basis_is_relative_premium() {
        let b = reading(101.0, 100.0).basis().unwrap();
        assert!((b - 0.01).abs() < 1e-12);
    }

    #[test]
    fn basis_none_without_spot() {
        assert!(reading(101.0, 0.0).basis().is_none());
    }

    #[test]
    fn readings_with_same_timestamp_are_valid() {
        // Several exchanges report the same tick.
        assert!(validate_futures(&[reading(101.0, 100.0), reading(100.5, 100.0)]).is_ok());
    }

    #[test]
    fn negative_open_interest_rejected() {
        let mut r = reading(101.0, 100.0);
        r.open_interest = -5.0;
        assert!(matches!(
            validate_futures(&[r]),
            Err(FeatureError::NegativeQuantity { field: "open_interest", .. })
        ));
    }
}
