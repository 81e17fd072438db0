//! Small descriptive-statistics helpers shared by the analysis crates.
//!
//! All functions return 0.0 instead of NaN on empty or degenerate input so
//! that nothing non-finite leaks into downstream scoring.

/// Values closer to zero than this are treated as zero variance.
pub const VARIANCE_EPSILON: f64 = 1e-12;

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Pearson correlation. Returns `None` for mismatched lengths, fewer than two
/// points, or a zero-variance input.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a < VARIANCE_EPSILON || var_b < VARIANCE_EPSILON {
        return None;
    }
    let r = covariance / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// ln(p[t] / p[t-1]); one element shorter than the input.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] > 0.0 && w[1] > 0.0 { (w[1] / w[0]).ln() } else { 0.0 })
        .collect()
}

/// p[t] / p[t-1] - 1; one element shorter than the input.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Largest peak-to-trough decline of a value curve, as a non-positive fraction.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            worst = worst.min(value / peak - 1.0);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&data), 5.0);
        assert_relative_eq!(std_dev(&data), 2.138_089_935, epsilon = 1e-6);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let c = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        assert_relative_eq!(pearson(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&a, &c).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_returns() {
        let prices = vec![100.0, 110.0, 99.0];
        let simple = simple_returns(&prices);
        assert_relative_eq!(simple[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(simple[1], -0.1, epsilon = 1e-12);
        let logs = log_returns(&prices);
        assert_relative_eq!(logs[0], 1.1_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        let curve = vec![1.0, 1.2, 0.9, 1.1, 1.3, 1.04];
        assert_relative_eq!(max_drawdown(&curve), -0.25, epsilon = 1e-12);
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }
}
