//! Descriptive statistics and a numerically safe `logsumexp`.

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased sample variance. Returns 0 for fewer than two observations.
pub fn sample_variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n as f64 - 1.0)
}

/// Standard error of the mean, assuming independent samples.
pub fn sem(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    (sample_variance(xs) / xs.len() as f64).sqrt()
}

/// `ln Σ exp(x_i)`, computed without overflow by shifting by the maximum.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let m = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        // All -inf (or empty): the sum is 0, whose log is -inf.
        return f64::NEG_INFINITY;
    }
    let s: f64 = xs.iter().map(|x| (x - m).exp()).sum();
    m + s.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_variance_basic() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&xs) - 2.5).abs() < 1e-12);
        assert!((sample_variance(&xs) - 5.0 / 3.0).abs() < 1e-12);
        assert!((sem(&xs) - (5.0 / 12.0f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn logsumexp_matches_naive_on_small_values() {
        let xs: [f64; 3] = [0.1, -0.3, 0.7];
        let naive = xs.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert!((logsumexp(&xs) - naive).abs() < 1e-12);
    }

    #[test]
    fn logsumexp_handles_large_magnitudes() {
        let xs = [1000.0, 1000.0];
        assert!((logsumexp(&xs) - (1000.0 + 2.0f64.ln())).abs() < 1e-9);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
    }
}
