// =============================================================================
// Relative Strength Index (RSI) — rolling-mean form
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Average gain / average loss are plain means over the last
//          `period` deltas (no smoothing carried from older bars).
// Step 3 — RS  = avg_gain / (avg_loss + 1e-9)
//          RSI = 100 - 100 / (1 + RS)
//
// A window with no movement at all reads 0, and a window with gains only
// reads just under 100.
//
// Crypto reading used by the technical scorer: RSI > 70 is momentum
// continuation (bullish), RSI < 30 is capitulation (bearish).
// =============================================================================

/// Keeps RS finite when the window has no losses.
const RS_EPSILON: f64 = 1e-9;

/// RSI at the last close over the trailing `period` deltas.
///
/// # Edge cases
/// - `period == 0` => `None`
/// - `closes.len() < period + 1` => `None`
/// - Any non-finite close inside the window => `None`
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (sum_gain, sum_loss) = window.windows(2).try_fold((0.0_f64, 0.0_f64), |(g, l), w| {
        let delta = w[1] - w[0];
        if !delta.is_finite() {
            return None;
        }
        Some(if delta > 0.0 { (g + delta, l) } else { (g, l - delta) })
    })?;

    let period_f = period as f64;
    let rs = (sum_gain / period_f) / (sum_loss / period_f + RS_EPSILON);
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rsi_empty_input() {
        assert!(latest_rsi(&[], 14).is_none());
    }

    #[test]
    fn rsi_insufficient_data() {
        // 14 closes => 13 deltas < 14.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(latest_rsi(&closes, 14).is_none());
    }

    #[test]
    fn rsi_known_value() {
        // Deltas +1, -0.5, +1.5 => avg gain 2.5/3, avg loss 0.5/3, RS ~ 5.
        let rsi = latest_rsi(&[10.0, 11.0, 10.5, 12.0], 3).unwrap();
        assert_abs_diff_eq!(rsi, 100.0 - 100.0 / 6.0, epsilon = 1e-6);
    }

    #[test]
    fn rsi_only_reads_trailing_window() {
        // A long rally followed by 14 alternating +1.0 / -0.8 bars: only the
        // chop counts, avg gain 0.5 vs avg loss 0.4.
        let mut closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        for i in 0..14 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 1.0 } else { last - 0.8 });
        }
        let rsi = latest_rsi(&closes, 14).unwrap();
        assert_abs_diff_eq!(rsi, 100.0 - 100.0 / 2.25, epsilon = 1e-6);
        assert!(rsi > 55.0 && rsi < 70.0);
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let rsi = latest_rsi(&closes, 14).unwrap();
        assert!(rsi < 100.0);
        assert_abs_diff_eq!(rsi, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        assert_abs_diff_eq!(latest_rsi(&closes, 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_flat_window_reads_zero() {
        let closes = vec![100.0; 30];
        assert_abs_diff_eq!(latest_rsi(&closes, 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for end in 15..=closes.len() {
            let v = latest_rsi(&closes[..end], 14).unwrap();
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_nan_in_window_is_none() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes.push(f64::NAN);
        assert!(latest_rsi(&closes, 14).is_none());
    }

    #[test]
    fn rsi_nan_outside_window_is_ignored() {
        let mut closes = vec![f64::NAN];
        closes.extend((1..=20).map(|x| x as f64));
        assert!(latest_rsi(&closes, 14).is_some());
    }
}
