// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula (recursive form, no bias adjustment):
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is only reported once `period` closes exist, so a short input
// yields nothing rather than an average dominated by the seed.
// =============================================================================

/// Compute the EMA series for the given `closes` slice and span `period`.
///
/// One output element per close, seeded with the first close.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period` => empty vec
/// - A non-finite intermediate value truncates the series at that point.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let mut result = Vec::with_capacity(closes.len());
    let mut prev_ema: Option<f64> = None;

    for &close in closes {
        let ema = match prev_ema {
            None => close,
            Some(prev) => close * multiplier + prev * (1.0 - multiplier),
        };
        if !ema.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        result.push(ema);
        prev_ema = Some(ema);
    }

    result
}

/// Most recent EMA value, `None` when the series is empty or was truncated
/// before reaching the last close.
pub fn latest_ema(closes: &[f64], period: usize) -> Option<f64> {
    let series = calculate_ema(closes, period);
    if series.len() != closes.len() {
        return None;
    }
    series.last().copied()
}

/// Difference between the latest fast and slow EMA (`fast - slow`).
///
/// Positive when the fast average sits above the slow one. `None` until both
/// averages are available.
pub fn ema_spread(closes: &[f64], fast: usize, slow: usize) -> Option<f64> {
    let f = latest_ema(closes, fast)?;
    let s = latest_ema(closes, slow)?;
    let spread = f - s;
    spread.is_finite().then_some(spread)
}
