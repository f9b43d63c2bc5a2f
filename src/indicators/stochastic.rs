// =============================================================================
// Stochastic Oscillator (%K / %D)
// =============================================================================
//
//   %K = 100 * (close - lowest_low(k)) / (highest_high(k) - lowest_low(k))
//   %D = SMA(d) of %K
//
// A window with no range (highest == lowest) has no defined %K, and neither
// does a window holding a non-finite high, low or close.
// =============================================================================

use crate::market_data::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticResult {
    pub k: f64,
    pub d: f64,
}

fn percent_k(window: &[Candle]) -> Option<f64> {
    if window
        .iter()
        .any(|c| !(c.high.is_finite() && c.low.is_finite() && c.close.is_finite()))
    {
        return None;
    }
    let close = window.last()?.close;
    let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let range = highest - lowest;
    if range.is_nan() || range <= 0.0 {
        return None;
    }
    let k = 100.0 * (close - lowest) / range;
    k.is_finite().then_some(k)
}

/// %K and %D at the last candle. Needs `k_period + d_period - 1` candles.
pub fn calculate_stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Option<StochasticResult> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period - 1 {
        return None;
    }

    let mut ks = Vec::with_capacity(d_period);
    for end in (candles.len() - d_period + 1)..=candles.len() {
        ks.push(percent_k(&candles[end - k_period..end])?);
    }

    let k = *ks.last()?;
    let d = ks.iter().sum::<f64>() / d_period as f64;
    Some(StochasticResult { k, d })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 1.0)
    }

    #[test]
    fn stochastic_close_at_high() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| {
                let c = 100.0 + i as f64;
                bar(c, c - 2.0, c)
            })
            .collect();
        let r = calculate_stochastic(&candles, 14, 3).unwrap();
        assert!((r.k - 100.0).abs() < 1e-10);
        assert!(r.d > 80.0);
    }

    #[test]
    fn stochastic_flat_window_undefined() {
        let candles = vec![bar(100.0, 100.0, 100.0); 20];
        assert!(calculate_stochastic(&candles, 14, 3).is_none());
    }

    #[test]
    fn stochastic_insufficient_data() {
        let candles = vec![bar(101.0, 99.0, 100.0); 15];
        assert!(calculate_stochastic(&candles, 14, 3).is_none());
        assert!(calculate_stochastic(&candles, 14, 2).is_some());
    }

    #[test]
    fn stochastic_non_finite_bar_is_undefined() {
        let mut candles: Vec<Candle> = (0..20).map(|i| bar(102.0 + i as f64, 98.0, 100.0)).collect();
        assert!(calculate_stochastic(&candles, 14, 3).is_some());

        candles[15].low = f64::NAN;
        assert!(calculate_stochastic(&candles, 14, 3).is_none());

        candles[15].low = 98.0;
        candles[18].high = f64::INFINITY;
        assert!(calculate_stochastic(&candles, 14, 3).is_none());
    }
}
