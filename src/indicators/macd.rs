// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   macd_line = EMA(fast) - EMA(slow)
//   signal    = EMA(signal_period) of macd_line
//   histogram = macd_line - signal
//
// Built on `calculate_ema`, so every stage is seeded from its first value.
// =============================================================================

use super::ema::calculate_ema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD at the last close.
///
/// Needs at least `slow + signal - 1` closes. Returns `None` when `fast >= slow`,
/// any period is zero, or a non-finite value truncates one of the series.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    if fast == 0 || signal == 0 || fast >= slow || closes.len() < slow + signal - 1 {
        return None;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    // Both series must reach the last close.
    if ema_fast.len() != closes.len() || ema_slow.len() != closes.len() {
        return None;
    }

    let macd_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();

    let signal_line = calculate_ema(&macd_line, signal);
    if signal_line.len() != macd_line.len() {
        return None;
    }

    let macd = *macd_line.last()?;
    let signal = *signal_line.last()?;
    let histogram = macd - signal;

    histogram.is_finite().then_some(MacdResult {
        macd,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data() {
        let closes: Vec<f64> = (1..=33).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
    }

    #[test]
    fn macd_minimum_bars() {
        let closes: Vec<f64> = (1..=34).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_some());
    }

    #[test]
    fn macd_flat_market_is_zero() {
        let r = calculate_macd(&[100.0; 60], 12, 26, 9).unwrap();
        assert!(r.macd.abs() < 1e-10);
        assert!(r.histogram.abs() < 1e-10);
    }

    #[test]
    fn macd_positive_in_accelerating_uptrend() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64).powf(1.5) * 0.1).collect();
        let r = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(r.macd > 0.0);
        assert!(r.histogram > 0.0);
    }

    #[test]
    fn macd_rejects_inverted_periods() {
        let closes = vec![1.0; 100];
        assert!(calculate_macd(&closes, 26, 12, 9).is_none());
    }
}
