// =============================================================================
// On-chain feature engine — mempool, fees, network activity
// =============================================================================
//
// Raw explorer metrics live on wildly different scales, so each headline
// metric is mapped to a [0, 1] score with a piecewise-linear curve anchored on
// typical ranges. Trend, volatility and momentum are taken over the reading
// history inside the window.

use tracing::debug;

use super::{FeatureEngine, FeatureSet, FeatureSpec, WindowSpec};
use crate::error::FeatureResult;
use crate::indicators::stats::{linear_slope, mean_first_difference, sample_std_dev};
use crate::market_data::onchain::validate_onchain;
use crate::market_data::OnChainReading;
use crate::types::Modality;

/// Average blocks per day used to turn 24h transaction counts into a
/// per-block figure.
const BLOCKS_PER_DAY: f64 = 144.0;

pub const SCHEMA: &[FeatureSpec] = &[
    FeatureSpec::number("mempool_congestion_score"),
    FeatureSpec::number("mempool_trend"),
    FeatureSpec::number("mempool_volatility"),
    FeatureSpec::number("mempool_momentum"),
    FeatureSpec::number("fee_pressure_score"),
    FeatureSpec::number("fee_trend"),
    FeatureSpec::number("fee_volatility"),
    FeatureSpec::number("network_activity_score"),
    FeatureSpec::number("network_trend"),
    FeatureSpec::number("network_volatility"),
    FeatureSpec::number("block_production_rate"),
    FeatureSpec::number("market_structure_score"),
    FeatureSpec::number("liquidity_score"),
    FeatureSpec::number("volatility_score"),
];

// -----------------------------------------------------------------------------
// Normalisation curves
// -----------------------------------------------------------------------------

/// Unconfirmed transaction count to [0, 1].
pub fn congestion_score(mempool_count: f64) -> f64 {
    if mempool_count < 1_000.0 {
        0.0
    } else if mempool_count < 10_000.0 {
        (mempool_count - 1_000.0) / 9_000.0
    } else if mempool_count < 50_000.0 {
        0.5 + (mempool_count - 10_000.0) / 80_000.0
    } else {
        (0.5 + (mempool_count - 50_000.0) / 100_000.0).min(1.0)
    }
}

/// 30-minute fee estimate (sat/vB) to [0, 1].
pub fn fee_pressure_score(fee_30min: f64) -> f64 {
    if fee_30min < 1.0 {
        0.0
    } else if fee_30min < 10.0 {
        fee_30min / 10.0
    } else if fee_30min < 50.0 {
        0.5 + (fee_30min - 10.0) / 80.0
    } else {
        (0.5 + (fee_30min - 50.0) / 100.0).min(1.0)
    }
}

/// 24h transaction count to [0, 1].
pub fn network_activity_score(transactions_24h: f64) -> f64 {
    let per_block = transactions_24h / BLOCKS_PER_DAY;
    if per_block < 200_000.0 {
        per_block / 200_000.0
    } else if per_block < 400_000.0 {
        0.5 + (per_block - 200_000.0) / 400_000.0
    } else {
        (0.5 + (per_block - 400_000.0) / 200_000.0).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnChainEngine;

fn series(readings: &[OnChainReading], f: impl Fn(&OnChainReading) -> Option<f64>) -> Vec<f64> {
    readings.iter().filter_map(f).collect()
}

/// Weighted mean over the components that are present.
fn partial_weighted(parts: &[(Option<f64>, f64)]) -> Option<f64> {
    let (sum, weight) = parts
        .iter()
        .filter_map(|(v, w)| v.map(|v| (v * w, *w)))
        .fold((0.0, 0.0), |(s, tw), (v, w)| (s + v, tw + w));
    (weight > 0.0).then(|| sum / weight)
}

impl FeatureEngine for OnChainEngine {
    type Input<'a> = &'a [OnChainReading];

    fn modality(&self) -> Modality {
        Modality::OnChain
    }

    fn schema(&self) -> &'static [FeatureSpec] {
        SCHEMA
    }

    fn build_features(&self, readings: &[OnChainReading], window: &WindowSpec) -> FeatureResult<FeatureSet> {
        validate_onchain(readings)?;

        let mut set = FeatureSet::from_schema(SCHEMA);
        let history = window.tail(readings);
        let Some(current) = history.last() else {
            debug!("on-chain: no readings, all features defaulted");
            return Ok(set);
        };

        let mempool = series(history, |r| r.mempool_count);
        let fees = series(history, |r| r.fee_30min);
        let txs = series(history, |r| r.network_transactions);

        let congestion = current.mempool_count.map(congestion_score);
        set.set_number("mempool_congestion_score", congestion);
        set.set_number("mempool_trend", linear_slope(&mempool));
        let mempool_vol = sample_std_dev(&mempool);
        set.set_number("mempool_volatility", mempool_vol);
        set.set_number(
            "mempool_momentum",
            mean_first_difference(&mempool, window.momentum_samples),
        );

        let fee_pressure = current.fee_30min.map(fee_pressure_score);
        set.set_number("fee_pressure_score", fee_pressure);
        set.set_number("fee_trend", linear_slope(&fees));
        let fee_vol = sample_std_dev(&fees);
        set.set_number("fee_volatility", fee_vol);

        let activity = current.network_transactions.map(network_activity_score);
        set.set_number("network_activity_score", activity);
        set.set_number("network_trend", linear_slope(&txs));
        let tx_vol = sample_std_dev(&txs);
        set.set_number("network_volatility", tx_vol);

        // Blocks per hour from tip height progress across the window.
        let tips: Vec<_> = history
            .iter()
            .filter_map(|r| r.tip_height.map(|h| (r.timestamp, h)))
            .collect();
        let production = match (tips.first(), tips.last()) {
            (Some((t0, h0)), Some((t1, h1))) if t1 > t0 => {
                let hours = (*t1 - *t0).num_seconds() as f64 / 3600.0;
                Some((h1 - h0) / hours)
            }
            _ => None,
        };
        set.set_number("block_production_rate", production);

        set.set_number(
            "market_structure_score",
            partial_weighted(&[(congestion, 0.4), (fee_pressure, 0.3), (activity, 0.3)]),
        );

        let liquidity = match (current.avg_tx_value_usd, current.fee_30min) {
            (Some(value), Some(fee)) => {
                let value_score = (value / 1_000_000.0).min(1.0);
                let fee_score = (1.0 - fee / 100.0).max(0.0);
                Some((value_score + fee_score) / 2.0)
            }
            _ => None,
        };
        set.set_number("liquidity_score", liquidity);

        let volatility = match (mempool_vol, fee_vol, tx_vol) {
            (None, None, None) => None,
            (m, f, t) => Some(
                (m.unwrap_or(0.0) / 10_000.0 + f.unwrap_or(0.0) / 50.0 + t.unwrap_or(0.0) / 100_000.0) / 3.0,
            ),
        };
        set.set_number("volatility_score", volatility);

        debug!(
            readings = history.len(),
            defaulted = set.defaulted().count(),
            "on-chain features built"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(30 * i)
    }

    fn reading(i: i64, mempool: f64, fee: f64) -> OnChainReading {
        OnChainReading {
            mempool_count: Some(mempool),
            fee_30min: Some(fee),
            tip_height: Some(800_000.0 + 3.0 * i as f64),
            ..OnChainReading::at(t(i))
        }
    }

    #[test]
    fn normalisation_curves() {
        assert_eq!(congestion_score(500.0), 0.0);
        assert_abs_diff_eq!(congestion_score(5_500.0), 0.5);
        assert_abs_diff_eq!(congestion_score(50_000.0), 0.5);
        assert_abs_diff_eq!(congestion_score(100_000.0), 1.0);
        assert_eq!(congestion_score(1.0e7), 1.0);
        assert_abs_diff_eq!(fee_pressure_score(5.0), 0.5);
        assert_abs_diff_eq!(fee_pressure_score(90.0), 0.9);
        assert_abs_diff_eq!(network_activity_score(144.0 * 100_000.0), 0.5);
    }

    #[test]
    fn no_readings_is_all_defaults() {
        let set = OnChainEngine.build_features(&[], &WindowSpec::default()).unwrap();
        assert!(set.all_defaulted());
    }

    #[test]
    fn missing_metrics_stay_defaulted() {
        let readings = vec![OnChainReading {
            mempool_count: Some(60_000.0),
            ..OnChainReading::at(t(0))
        }];
        let set = OnChainEngine.build_features(&readings, &WindowSpec::default()).unwrap();
        assert_abs_diff_eq!(set.number("mempool_congestion_score"), 0.6);
        assert!(set.is_defaulted("fee_pressure_score"));
        assert!(set.is_defaulted("network_activity_score"));
        // Structure score uses only the congestion component.
        assert_abs_diff_eq!(set.number("market_structure_score"), 0.6);
        assert!(set.is_defaulted("mempool_trend"));
    }

    #[test]
    fn history_features() {
        let readings: Vec<OnChainReading> = (0..5)
            .map(|i| reading(i, 10_000.0 + 1_000.0 * i as f64, 20.0))
            .collect();
        let set = OnChainEngine.build_features(&readings, &WindowSpec::default()).unwrap();
        assert_abs_diff_eq!(set.number("mempool_trend"), 1_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(set.number("mempool_momentum"), 1_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(set.number("fee_volatility"), 0.0);
        // 3 blocks per 30 minutes.
        assert_abs_diff_eq!(set.number("block_production_rate"), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_metric_is_malformed() {
        let readings = vec![reading(0, -5.0, 1.0)];
        assert!(OnChainEngine.build_features(&readings, &WindowSpec::default()).is_err());
    }
}
