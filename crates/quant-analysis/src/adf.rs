//! Augmented Dickey-Fuller unit-root test.
//!
//! The lag order is picked by AIC over a common sample, then the chosen
//! lag is refit on every available row. p-values come from
//! MacKinnon's (1994) approximate response surfaces.

use nalgebra::DMatrix;
use pair_core::PairError;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::regression::ols;

/// Shortest series the test will run on.
pub const MIN_ADF_OBSERVATIONS: usize = 10;

/// Deterministic terms in the test regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdfRegression {
    Constant,
    NoConstant,
}

impl AdfRegression {
    fn trend_terms(self) -> usize {
        match self {
            AdfRegression::Constant => 1,
            AdfRegression::NoConstant => 0,
        }
    }
}

/// Which MacKinnon surface converts tau into a p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueSurface {
    /// Plain unit-root test on one observed series.
    SingleSeries,
    /// Residuals of a two-variable cointegrating regression with a constant.
    TwoSeriesResidual,
}

struct Surface {
    max_stat: f64,
    min_stat: f64,
    star_stat: f64,
    small_p: [f64; 3],
    large_p: [f64; 4],
}

// Constant-term ('c') coefficients for N = 1 and N = 2 integrated variables.
const SINGLE_SERIES: Surface = Surface {
    max_stat: 2.74,
    min_stat: -18.83,
    star_stat: -1.61,
    small_p: [2.1659, 1.4412, 0.038269],
    large_p: [1.7339, 0.93202, -0.12745, -0.010368],
};

const TWO_SERIES_RESIDUAL: Surface = Surface {
    max_stat: 0.92,
    min_stat: -18.86,
    star_stat: -2.62,
    small_p: [2.92, 1.5012, 0.039796],
    large_p: [2.1945, 0.64695, -0.29198, -0.042377],
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// tau: t-statistic on the lagged level.
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
}

/// MacKinnon approximate p-value for an ADF tau statistic.
pub fn mackinnon_pvalue(tau: f64, surface: PValueSurface) -> f64 {
    let s = match surface {
        PValueSurface::SingleSeries => &SINGLE_SERIES,
        PValueSurface::TwoSeriesResidual => &TWO_SERIES_RESIDUAL,
    };
    if tau.is_nan() {
        return 1.0;
    }
    if tau > s.max_stat {
        return 1.0;
    }
    if tau < s.min_stat {
        return 0.0;
    }
    let poly = if tau <= s.star_stat {
        s.small_p[0] + s.small_p[1] * tau + s.small_p[2] * tau * tau
    } else {
        s.large_p[0] + s.large_p[1] * tau + s.large_p[2] * tau * tau + s.large_p[3] * tau.powi(3)
    };
    Normal::standard().cdf(poly).clamp(0.0, 1.0)
}

/// Schwert's rule of thumb, capped so the regression stays identified.
pub fn max_lag(nobs: usize, regression: AdfRegression) -> usize {
    let rule = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (nobs / 2).saturating_sub(regression.trend_terms() + 1);
    rule.min(cap)
}

/// Rows `start..dy.len()` of the test regression with `lags` lagged differences.
/// Columns: lagged level, lagged differences, then the constant if any.
fn design(
    levels: &[f64],
    dy: &[f64],
    lags: usize,
    start: usize,
    regression: AdfRegression,
) -> (Vec<f64>, DMatrix<f64>) {
    let rows = dy.len() - start;
    let cols = 1 + lags + regression.trend_terms();
    let y: Vec<f64> = dy[start..].to_vec();
    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = start + r;
        if c == 0 {
            levels[t]
        } else if c <= lags {
            dy[t - c]
        } else {
            1.0
        }
    });
    (y, x)
}

pub fn adf_test(series: &[f64], regression: AdfRegression, surface: PValueSurface) -> Result<AdfResult, PairError> {
    if series.len() < MIN_ADF_OBSERVATIONS {
        return Err(PairError::InsufficientHistory {
            required: MIN_ADF_OBSERVATIONS,
            actual: series.len(),
        });
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(PairError::InvalidSeries("non-finite value in ADF input".to_string()));
    }

    let dy: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let maxlag = max_lag(series.len(), regression);

    let mut best: Option<(usize, f64)> = None;
    for lags in 0..=maxlag {
        let (y, x) = design(series, &dy, lags, maxlag, regression);
        let Ok(fit) = ols(&y, &x) else { continue };
        let aic = fit.aic();
        if aic.is_finite() && best.map_or(true, |(_, b)| aic < b) {
            best = Some((lags, aic));
        }
    }
    let (used_lag, _) = best.ok_or_else(|| {
        PairError::RegressionDegenerate("no ADF lag order produced a usable fit".to_string())
    })?;

    let (y, x) = design(series, &dy, used_lag, used_lag, regression);
    let fit = ols(&y, &x)?;
    let statistic = fit
        .t_stat(0)
        .ok_or_else(|| PairError::RegressionDegenerate("zero standard error on lagged level".to_string()))?;

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_pvalue(statistic, surface),
        used_lag,
        nobs: fit.nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_pvalue_bounds_and_monotonicity() {
        assert_eq!(mackinnon_pvalue(5.0, PValueSurface::SingleSeries), 1.0);
        assert_eq!(mackinnon_pvalue(-25.0, PValueSurface::SingleSeries), 0.0);
        assert_eq!(mackinnon_pvalue(f64::NAN, PValueSurface::TwoSeriesResidual), 1.0);

        let mut last = 0.0;
        for i in 0..80 {
            let tau = -8.0 + i as f64 * 0.1;
            let p = mackinnon_pvalue(tau, PValueSurface::TwoSeriesResidual);
            assert!((0.0..=1.0).contains(&p));
            assert!(p + 1e-9 >= last, "p-value decreased at tau={}", tau);
            last = p;
        }
    }

    #[test]
    fn test_pvalue_matches_critical_values() {
        // 5% critical values: -2.86 for one series, -3.34 for a two-series residual.
        let single = mackinnon_pvalue(-2.86, PValueSurface::SingleSeries);
        assert!((0.04..0.06).contains(&single), "single-series p={}", single);
        let resid = mackinnon_pvalue(-3.34, PValueSurface::TwoSeriesResidual);
        assert!((0.04..0.06).contains(&resid), "residual p={}", resid);
    }

    #[test]
    fn test_max_lag() {
        assert_eq!(max_lag(100, AdfRegression::Constant), 12);
        assert_eq!(max_lag(252, AdfRegression::Constant), 16);
        assert_eq!(max_lag(10, AdfRegression::Constant), 3);
        assert_eq!(max_lag(10, AdfRegression::NoConstant), 4);
    }

    #[test]
    fn test_white_noise_is_stationary() {
        let mut rng = StdRng::seed_from_u64(3);
        let series = noise(&mut rng, 250);
        let result = adf_test(&series, AdfRegression::Constant, PValueSurface::SingleSeries).unwrap();
        assert!(result.statistic < -4.0, "tau={}", result.statistic);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn test_random_walk_has_unit_root() {
        let mut rejections = 0;
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut level = 100.0;
            let series: Vec<f64> = noise(&mut rng, 250)
                .into_iter()
                .map(|e| {
                    level += e;
                    level
                })
                .collect();
            let result = adf_test(&series, AdfRegression::Constant, PValueSurface::SingleSeries).unwrap();
            if result.p_value < 0.05 {
                rejections += 1;
            }
        }
        assert!(rejections <= 2, "{} of 5 random walks rejected", rejections);
    }

    #[test]
    fn test_short_series_rejected() {
        let err = adf_test(&[1.0, 2.0, 3.0], AdfRegression::Constant, PValueSurface::SingleSeries).unwrap_err();
        assert_eq!(err, PairError::InsufficientHistory { required: 10, actual: 3 });
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let err = adf_test(&[4.0; 40], AdfRegression::Constant, PValueSurface::SingleSeries).unwrap_err();
        assert!(matches!(err, PairError::RegressionDegenerate(_)));
    }
}
