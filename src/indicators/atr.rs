// =============================================================================
// Average True Range (ATR) — rolling mean
// =============================================================================
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
// The very first bar has no previous close, so its TR is H - L.
//
// ATR is the plain mean of the last `period` TR values.
// =============================================================================

use crate::market_data::Candle;

/// Compute the most recent ATR value from a slice of OHLCV candles.
///
/// Returns `None` when `period` is zero, there are fewer than `period`
/// candles, or any high, low or close feeding the window is non-finite.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let start = candles.len() - period;
    let mut sum = 0.0;
    for i in start..candles.len() {
        let prev_close = i.checked_sub(1).map(|p| candles[p].close);
        sum += true_range(&candles[i], prev_close)?;
    }

    let atr = sum / period as f64;
    atr.is_finite().then_some(atr)
}

fn true_range(bar: &Candle, prev_close: Option<f64>) -> Option<f64> {
    // f64::max would quietly prefer the finite operand.
    if !(bar.high.is_finite() && bar.low.is_finite() && bar.close.is_finite()) {
        return None;
    }
    let hl = bar.high - bar.low;
    match prev_close {
        None => Some(hl),
        Some(pc) if pc.is_finite() => Some(hl.max((bar.high - pc).abs()).max((bar.low - pc).abs())),
        Some(_) => None,
    }
}

/// ATR as a fraction of the last close (0.02 = 2%).
///
/// Comparable across assets with different price scales.
pub fn atr_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let last_close = candles.last()?.close;
    if last_close <= 0.0 {
        return None;
    }
    let ratio = atr / last_close;
    ratio.is_finite().then_some(ratio)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 100.0)
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(105.0, 95.0, 102.0); 20];
        assert!(calculate_atr(&candles, 0).is_none());
    }

    #[test]
    fn atr_insufficient_data() {
        let candles = vec![candle(105.0, 95.0, 102.0); 10];
        assert!(calculate_atr(&candles, 14).is_none());
    }

    #[test]
    fn atr_constant_range() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                candle(base + 5.0, base - 5.0, base)
            })
            .collect();
        let atr = calculate_atr(&candles, 14).unwrap();
        assert!((atr - 10.0).abs() < 1.0, "expected ATR near 10.0, got {atr}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        let candles = vec![
            candle(105.0, 95.0, 95.0),
            candle(115.0, 108.0, 112.0), // |115 - 95| = 20 > 7
            candle(118.0, 110.0, 115.0), // 8
            candle(120.0, 113.0, 118.0), // 7
        ];
        let atr = calculate_atr(&candles, 3).unwrap();
        assert_abs_diff_eq!(atr, 35.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn atr_first_bar_uses_high_low() {
        let candles = vec![
            candle(105.0, 95.0, 95.0),   // 10, no previous close
            candle(115.0, 108.0, 112.0), // 20
            candle(118.0, 110.0, 115.0), // 8
        ];
        let atr = calculate_atr(&candles, 3).unwrap();
        assert_abs_diff_eq!(atr, 38.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn atr_ratio_is_fraction_of_price() {
        let candles: Vec<Candle> = (0..30).map(|_| candle(101.0, 99.0, 100.0)).collect();
        let ratio = atr_ratio(&candles, 14).unwrap();
        assert!((ratio - 0.02).abs() < 1e-9);
    }

    #[test]
    fn atr_nan_returns_none() {
        let candles = vec![
            candle(105.0, 95.0, 100.0),
            candle(f64::NAN, 95.0, 100.0),
            candle(105.0, 95.0, 100.0),
            candle(105.0, 95.0, 100.0),
        ];
        assert!(calculate_atr(&candles, 3).is_none());
    }

    #[test]
    fn atr_nan_low_or_prev_close_returns_none() {
        let mut candles = vec![candle(105.0, 95.0, 100.0); 5];
        candles[3].low = f64::NAN;
        assert!(calculate_atr(&candles, 3).is_none());

        let mut candles = vec![candle(105.0, 95.0, 100.0); 5];
        candles[1].close = f64::NAN;
        // Bar 1's close is the previous close of the first bar in the window.
        assert!(calculate_atr(&candles, 3).is_none());
        assert!(atr_ratio(&candles, 3).is_none());
    }

    #[test]
    fn atr_nan_before_window_is_ignored() {
        let mut candles = vec![candle(105.0, 95.0, 100.0); 6];
        candles[0].high = f64::NAN;
        assert_abs_diff_eq!(calculate_atr(&candles, 3).unwrap(), 10.0);
    }
}
