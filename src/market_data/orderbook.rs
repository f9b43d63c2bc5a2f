// =============================================================================
// Order-book snapshots and trade prints
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};

/// A price level: (price, quantity).
pub type Level = (f64, f64);

/// Top-of-book depth snapshot. Bids are sorted best (highest) first, asks
/// best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.0)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.0)
    }

    pub fn mid_price(&self) -> Option<f64> {
        let mid = (self.best_bid()? + self.best_ask()?) / 2.0;
        (mid > 0.0).then_some(mid)
    }

    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let mid = self.mid_price()?;
        Some((self.spread()? / mid) * 10_000.0)
    }

    pub fn bid_depth(&self) -> f64 {
        self.bids.iter().map(|l| l.1).sum()
    }

    pub fn ask_depth(&self) -> f64 {
        self.asks.iter().map(|l| l.1).sum()
    }

    /// (bid depth - ask depth) / total depth, in [-1, +1].
    pub fn volume_imbalance(&self) -> f64 {
        let bid = self.bid_depth();
        let ask = self.ask_depth();
        let total = bid + ask;
        if total > 0.0 {
            (bid - ask) / total
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A single executed trade (taker side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub side: TradeSide,
}

impl Trade {
    /// Quote notional (price * quantity).
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

pub fn validate_snapshots(snapshots: &[OrderBookSnapshot]) -> FeatureResult<()> {
    for (index, snap) in snapshots.iter().enumerate() {
        for &(price, qty) in snap.bids.iter().chain(snap.asks.iter()) {
            if price < 0.0 {
                return Err(FeatureError::NegativePrice { index, value: price });
            }
            if qty < 0.0 {
                return Err(FeatureError::NegativeQuantity {
                    field: "level quantity",
                    index,
                    value: qty,
                });
            }
        }
        if let (Some(bid), Some(ask)) = (snap.best_bid(), snap.best_ask()) {
            if ask < bid {
                return Err(FeatureError::InvertedRange {
                    index,
                    high: ask,
                    low: bid,
                });
            }
        }
        if index > 0 && snap.timestamp <= snapshots[index - 1].timestamp {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}

pub fn validate_trades(trades: &[Trade]) -> FeatureResult<()> {
    for (index, t) in trades.iter().enumerate() {
        if t.price < 0.0 {
            return Err(FeatureError::NegativePrice { index, value: t.price });
        }
        if t.quantity < 0.0 {
            return Err(FeatureError::NegativeQuantity {
                field: "trade quantity",
                index,
                value: t.quantity,
            });
        }
        if index > 0 && t.timestamp < trades[index - 1].timestamp {
            return Err(FeatureError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(bids: Vec<Level>, asks: Vec<Level>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            bids,
            asks,
        }
    }

    #[test]
    fn spread_and_imbalance() {
        let snap = snapshot(vec![(99.0, 3.0), (98.0, 1.0)], vec![(101.0, 1.0), (102.0, 1.0)]);
        assert_eq!(snap.mid_price(), Some(100.0));
        assert!((snap.spread_bps().unwrap() - 200.0).abs() < 1e-9);
        // (4 - 2) / 6
        assert!((snap.volume_imbalance() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_book_is_neutral() {
        let snap = snapshot(vec![], vec![]);
        assert_eq!(snap.mid_price(), None);
        assert_eq!(snap.volume_imbalance(), 0.0);
    }

    #[test]
    fn crossed_book_rejected() {
        let snap = snapshot(vec![(101.0, 1.0)], vec![(100.0, 1.0)]);
        assert!(matches!(
            validate_snapshots(&[snap]),
            Err(FeatureError::InvertedRange { index: 0, .. })
        ));
    }
}
