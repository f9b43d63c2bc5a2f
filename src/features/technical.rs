// =============================================================================
// Technical-analysis feature engine
// =============================================================================
//
// Fixed indicator windows regardless of call site so runs stay comparable:
//   RSI 14, MACD 12/26/9, EMA 8/20/50, Bollinger 20/2σ, ATR 14,
//   Stochastic 14/3, momentum over 1/2/4 bars, volume vs 4-bar mean.
//
// An indicator without enough bars leaves its features at the default.

use tracing::debug;

use super::{FeatureEngine, FeatureSet, FeatureSpec, WindowSpec};
use crate::error::FeatureResult;
use crate::indicators::{atr, bollinger, ema, macd, roc, rsi, stochastic};
use crate::market_data::{candle::validate_series, Candle};
use crate::types::Modality;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const EMA_FAST: usize = 8;
pub const EMA_MEDIUM: usize = 20;
pub const EMA_SLOW: usize = 50;
pub const BB_PERIOD: usize = 20;
pub const BB_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;
pub const STOCH_K: usize = 14;
pub const STOCH_D: usize = 3;
pub const VOLUME_MEAN_BARS: usize = 4;
/// ATR above this fraction of price is the "high" volatility regime.
pub const HIGH_VOLATILITY_ATR: f64 = 0.02;

pub const SCHEMA: &[FeatureSpec] = &[
    FeatureSpec::number("rsi14"),
    FeatureSpec::number("macd_hist"),
    FeatureSpec::number("ema8_above_ema20"),
    FeatureSpec::number("ema20_above_ema50"),
    FeatureSpec::number("bb_upper"),
    FeatureSpec::number("bb_lower"),
    FeatureSpec::number("bb_position"),
    FeatureSpec::number("atr_ratio"),
    FeatureSpec::number("stoch_k"),
    FeatureSpec::number("stoch_d"),
    FeatureSpec::number("momentum_1"),
    FeatureSpec::number("momentum_2"),
    FeatureSpec::number("momentum_4"),
    FeatureSpec::number("volume_ratio"),
    FeatureSpec::tag("market_trend"),
    FeatureSpec::tag("market_volatility"),
    FeatureSpec::number("close"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalEngine;

impl FeatureEngine for TechnicalEngine {
    type Input<'a> = &'a [Candle];

    fn modality(&self) -> Modality {
        Modality::Technical
    }

    fn schema(&self) -> &'static [FeatureSpec] {
        SCHEMA
    }

    fn build_features(&self, candles: &[Candle], window: &WindowSpec) -> FeatureResult<FeatureSet> {
        validate_series(candles)?;

        let bars = &candles[candles.len().saturating_sub(window.lookback_bars)..];
        let closes: Vec<f64> = bars.iter().map(|c| c.close).collect();
        let mut set = FeatureSet::from_schema(SCHEMA);

        let Some(last) = bars.last() else {
            debug!("technical: no candles, all features defaulted");
            return Ok(set);
        };
        let close = (last.close > 0.0).then_some(last.close);
        set.set_number("close", close);

        set.set_number("rsi14", rsi::latest_rsi(&closes, RSI_PERIOD));
        set.set_number(
            "macd_hist",
            macd::calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL).map(|m| m.histogram),
        );

        set.set_number("ema8_above_ema20", ema::ema_spread(&closes, EMA_FAST, EMA_MEDIUM));
        let medium_vs_slow = ema::ema_spread(&closes, EMA_MEDIUM, EMA_SLOW);
        set.set_number("ema20_above_ema50", medium_vs_slow);

        if let Some(bb) = bollinger::calculate_bollinger(&closes, BB_PERIOD, BB_STD) {
            set.set_number("bb_upper", Some(bb.upper));
            set.set_number("bb_lower", Some(bb.lower));
            set.set_number("bb_position", Some(bb.position(last.close)));
        }

        let atr_ratio = atr::atr_ratio(bars, ATR_PERIOD);
        set.set_number("atr_ratio", atr_ratio);

        if let Some(st) = stochastic::calculate_stochastic(bars, STOCH_K, STOCH_D) {
            set.set_number("stoch_k", Some(st.k));
            set.set_number("stoch_d", Some(st.d));
        }

        set.set_number("momentum_1", roc::fractional_change(&closes, 1));
        set.set_number("momentum_2", roc::fractional_change(&closes, 2));
        set.set_number("momentum_4", roc::fractional_change(&closes, 4));
        set.set_number("volume_ratio", volume_ratio(bars));

        set.set_tag(
            "market_trend",
            medium_vs_slow.map(|d| if d > 0.0 { "uptrend" } else { "downtrend" }),
        );
        set.set_tag(
            "market_volatility",
            atr_ratio.map(|r| if r > HIGH_VOLATILITY_ATR { "high" } else { "low" }),
        );

        debug!(
            bars = bars.len(),
            defaulted = set.defaulted().count(),
            "technical features built"
        );
        Ok(set)
    }
}

/// Last volume over the mean of the last `VOLUME_MEAN_BARS` volumes.
fn volume_ratio(bars: &[Candle]) -> Option<f64> {
    if bars.len() < VOLUME_MEAN_BARS {
        return None;
    }
    let tail = &bars[bars.len() - VOLUME_MEAN_BARS..];
    let mean = tail.iter().map(|c| c.volume).sum::<f64>() / VOLUME_MEAN_BARS as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(tail[VOLUME_MEAN_BARS - 1].volume / mean)
}
