// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Upper band (SMA + k*σ) and lower band (SMA - k*σ), with σ the sample
// standard deviation (n - 1) of the window. The band position of the last
// close, (close - lower) / (upper - lower), is what the technical scorer
// reads: near 1.0 the close rides the upper band, near 0.0 the lower one.

use super::stats::sample_std_dev;

#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: f64,
    pub lower: f64,
}

impl BollingerResult {
    /// Position of `close` inside the bands. 0.5 when the bands collapse
    /// (flat window).
    pub fn position(&self, close: f64) -> f64 {
        let range = self.upper - self.lower;
        if range <= 0.0 {
            return 0.5;
        }
        (close - self.lower) / range
    }
}

/// Calculate Bollinger Bands over the last `period` closes.
///
/// Returns `None` with fewer than `period` closes (at least two), or when
/// any close in the window is non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period < 2 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    if window.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let middle = window.iter().sum::<f64>() / period as f64;
    let std_dev = sample_std_dev(window)?;

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;

    (upper.is_finite() && lower.is_finite()).then_some(BollingerResult { upper, lower })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bollinger_uses_sample_std_dev() {
        // 1..=20: mean 10.5, sample variance 35.
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        let sigma = 35.0_f64.sqrt();
        assert_abs_diff_eq!(bb.upper, 10.5 + 2.0 * sigma, epsilon = 1e-12);
        assert_abs_diff_eq!(bb.lower, 10.5 - 2.0 * sigma, epsilon = 1e-12);
        // Last close of a steady ramp sits in the upper half.
        assert!(bb.position(20.0) > 0.5);
    }

    #[test]
    fn bollinger_reads_trailing_window_only() {
        let mut closes = vec![1_000.0; 5];
        closes.extend([1.0, 2.0, 3.0]);
        let bb = calculate_bollinger(&closes, 3, 1.0).unwrap();
        assert_abs_diff_eq!(bb.upper, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bb.lower, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bb.position(2.5), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
        assert!(calculate_bollinger(&[1.0], 1, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat_position_is_middle() {
        let bb = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert_eq!(bb.upper, bb.lower);
        assert_eq!(bb.position(100.0), 0.5);
    }

    #[test]
    fn bollinger_nan_rejected() {
        let mut closes = vec![100.0; 20];
        closes[10] = f64::NAN;
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }
}
