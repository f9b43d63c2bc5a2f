// =============================================================================
// Window statistics
// =============================================================================
//
// Small helpers shared by the derivatives, on-chain and order-book feature
// engines.  Non-finite samples are skipped, so a single bad reading cannot
// poison a whole window.

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite())
}

/// Arithmetic mean of the finite samples.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = finite(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Population standard deviation. `None` with fewer than two finite samples.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let samples: Vec<f64> = finite(values).collect();
    if samples.len() < 2 {
        return None;
    }
    let m = samples.iter().sum::<f64>() / samples.len() as f64;
    let var = samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / samples.len() as f64;
    Some(var.sqrt())
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let samples: Vec<f64> = finite(values).collect();
    if samples.len() < 2 {
        return None;
    }
    let m = samples.iter().sum::<f64>() / samples.len() as f64;
    let var = samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    Some(var.sqrt())
}

/// Mean of first differences over the last `n` finite samples.
///
/// This is the momentum feature every non-price modality carries.
pub fn mean_first_difference(values: &[f64], n: usize) -> Option<f64> {
    let samples: Vec<f64> = finite(values).collect();
    let tail = &samples[samples.len().saturating_sub(n)..];
    if tail.len() < 2 {
        return None;
    }
    // Telescoping sum of the differences.
    Some((tail[tail.len() - 1] - tail[0]) / (tail.len() - 1) as f64)
}

/// Least-squares slope against the sample index.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let samples: Vec<f64> = finite(values).collect();
    let n = samples.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = samples.iter().sum::<f64>() / n as f64;
    let (num, den) = samples.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, y)| {
        let dx = i as f64 - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });
    let slope = num / den;
    slope.is_finite().then_some(slope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mean_skips_non_finite() {
        assert_abs_diff_eq!(mean(&[1.0, f64::NAN, 3.0]).unwrap(), 2.0);
        assert!(mean(&[]).is_none());
        assert!(mean(&[f64::INFINITY]).is_none());
    }

    #[test]
    fn std_dev_population_and_sample() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(std_dev(&v).unwrap(), 2.0, epsilon = 1e-12);
        assert!(sample_std_dev(&v).unwrap() > 2.0);
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn mean_first_difference_uses_tail() {
        let v = [100.0, 0.0, 1.0, 3.0, 6.0];
        // Last three: 1, 3, 6 -> diffs 2, 3 -> mean 2.5
        assert_abs_diff_eq!(mean_first_difference(&v, 3).unwrap(), 2.5, epsilon = 1e-12);
        assert!(mean_first_difference(&[1.0], 10).is_none());
    }

    #[test]
    fn slope_of_line() {
        let v: Vec<f64> = (0..10).map(|i| 3.0 * i as f64 + 1.0).collect();
        assert_abs_diff_eq!(linear_slope(&v).unwrap(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(linear_slope(&[5.0, 5.0, 5.0]).unwrap(), 0.0);
    }
}
