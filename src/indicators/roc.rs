// =============================================================================
// Rate of Change (ROC) — Momentum Indicator
// =============================================================================
//
//   change = (close - close_n) / close_n
//
// The fractional form of ROC; the technical feature engine reads it over
// 1, 2 and 4 bars.

/// Fractional change of the last close versus `bars_back` bars earlier.
///
/// `None` when there is not enough history, the reference close is zero, or
/// the result is non-finite.
pub fn fractional_change(closes: &[f64], bars_back: usize) -> Option<f64> {
    if bars_back == 0 || closes.len() <= bars_back {
        return None;
    }
    let last = *closes.last()?;
    let prev = closes[closes.len() - 1 - bars_back];
    if prev == 0.0 {
        return None;
    }
    let change = (last - prev) / prev;
    change.is_finite().then_some(change)
}
