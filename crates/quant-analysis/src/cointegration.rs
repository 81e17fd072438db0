use pair_core::stats::{self, VARIANCE_EPSILON};
use pair_core::{CointegrationMethod, CointegrationResult, PairCandidate, PairError, ScreeningConfig};

use crate::adf::{adf_test, AdfRegression, PValueSurface};
use crate::alignment::AlignedPair;
use crate::johansen::johansen_test;
use crate::regression::linear_fit;

/// Residual deviation below this fraction of the dependent series' deviation
/// means the two series are exact multiples of each other.
const PERFECT_FIT_RATIO: f64 = 1e-10;

/// Half-lives are reported up to one trading year.
pub const MAX_HALF_LIFE: f64 = 252.0;

/// Periods for a deviation of the spread to halve, from `Δε_t = λ ε_{t-1}`,
/// capped at [`MAX_HALF_LIFE`].
///
/// `None` when λ >= 0 (no pull back toward the mean) or the spread is flat.
pub fn half_life(spread: &[f64]) -> Option<f64> {
    if spread.len() < 3 {
        return None;
    }
    let (mut num, mut den) = (0.0, 0.0);
    for w in spread.windows(2) {
        num += w[0] * (w[1] - w[0]);
        den += w[0] * w[0];
    }
    if den <= VARIANCE_EPSILON {
        return None;
    }
    let lambda = num / den;
    if !lambda.is_finite() || lambda >= 0.0 {
        return None;
    }
    let hl = -std::f64::consts::LN_2 / (1.0 + lambda).max(f64::EPSILON).ln();
    (hl.is_finite() && hl > 0.0).then_some(hl.min(MAX_HALF_LIFE))
}

/// Statistic, p-value and spread coefficients from one test.
#[derive(Debug, Clone, Copy)]
struct TestFit {
    method: CointegrationMethod,
    statistic: f64,
    p_value: f64,
    hedge_ratio: f64,
    intercept: f64,
}

fn engle_granger(aligned: &AlignedPair) -> Result<TestFit, PairError> {
    let (a, b) = (&aligned.first, &aligned.second);
    let (alpha, beta, residuals) = linear_fit(a, b)?;
    if stats::std_dev(&residuals) < PERFECT_FIT_RATIO * stats::std_dev(a) {
        return Err(PairError::RegressionDegenerate(format!(
            "{}: series are exactly collinear",
            aligned.pair
        )));
    }
    let adf = adf_test(&residuals, AdfRegression::NoConstant, PValueSurface::TwoSeriesResidual)?;
    Ok(TestFit {
        method: CointegrationMethod::EngleGranger,
        statistic: adf.statistic,
        p_value: adf.p_value,
        hedge_ratio: beta,
        intercept: alpha,
    })
}

fn johansen(aligned: &AlignedPair) -> Result<TestFit, PairError> {
    let (a, b) = (&aligned.first, &aligned.second);
    let jo = johansen_test(a, b)?;
    let beta = jo.hedge_ratio().ok_or_else(|| {
        PairError::RegressionDegenerate(format!("{}: cointegrating vector has no weight on first leg", aligned.pair))
    })?;
    let alpha = stats::mean(&a.iter().zip(b).map(|(x, y)| x - beta * y).collect::<Vec<_>>());
    Ok(TestFit {
        method: CointegrationMethod::Johansen,
        statistic: jo.trace[0],
        p_value: jo.trace_pvalue(),
        hedge_ratio: beta,
        intercept: alpha,
    })
}

/// Lower p-value wins; Engle-Granger on ties since its p-value is continuous.
/// One failing test does not sink the pair while the other succeeds.
fn combined(aligned: &AlignedPair) -> Result<TestFit, PairError> {
    match (engle_granger(aligned), johansen(aligned)) {
        (Ok(eg), Ok(jo)) => {
            tracing::trace!("{}: engle_granger p={:.4}, johansen p={:.4}", aligned.pair, eg.p_value, jo.p_value);
            Ok(if jo.p_value < eg.p_value { jo } else { eg })
        }
        (Ok(eg), Err(e)) => {
            tracing::debug!("{}: johansen failed ({}), keeping engle_granger", aligned.pair, e);
            Ok(eg)
        }
        (Err(e), Ok(jo)) => {
            tracing::debug!("{}: engle_granger failed ({}), keeping johansen", aligned.pair, e);
            Ok(jo)
        }
        (Err(e), Err(_)) => Err(e),
    }
}

/// Runs the configured cointegration procedure on an aligned candidate.
#[derive(Debug, Clone)]
pub struct CointegrationTester {
    method: CointegrationMethod,
    pvalue_threshold: f64,
    min_observations: usize,
}

impl CointegrationTester {
    pub fn new(method: CointegrationMethod, pvalue_threshold: f64, min_observations: usize) -> Self {
        Self {
            method,
            pvalue_threshold,
            min_observations,
        }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.method, config.cointegration_pvalue, config.min_observations)
    }

    pub fn method(&self) -> CointegrationMethod {
        self.method
    }

    /// Estimate hedge ratio, intercept, p-value and spread statistics.
    ///
    /// A result with `is_cointegrated == false` is still `Ok`; errors are
    /// reserved for inputs the statistics cannot be computed on.
    pub fn test(&self, candidate: &PairCandidate, aligned: &AlignedPair) -> Result<CointegrationResult, PairError> {
        if aligned.len() < self.min_observations {
            return Err(PairError::InsufficientHistory {
                required: self.min_observations,
                actual: aligned.len(),
            });
        }
        let (a, b) = (&aligned.first, &aligned.second);

        if stats::std_dev(b) <= VARIANCE_EPSILON || stats::std_dev(a) <= VARIANCE_EPSILON {
            return Err(PairError::RegressionDegenerate(format!("{}: constant price series", aligned.pair)));
        }

        let TestFit {
            method,
            statistic: test_statistic,
            p_value,
            hedge_ratio,
            intercept,
        } = match self.method {
            CointegrationMethod::EngleGranger => engle_granger(aligned)?,
            CointegrationMethod::Johansen => johansen(aligned)?,
            CointegrationMethod::Combined => combined(aligned)?,
        };

        let spread: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - hedge_ratio * y - intercept).collect();
        let spread_std = stats::std_dev(&spread);
        if spread_std <= VARIANCE_EPSILON {
            return Err(PairError::NoSignal(format!("{}: zero-variance spread", aligned.pair)));
        }
        let half_life = half_life(&spread);
        let stationarity_score = adf_test(&spread, AdfRegression::Constant, PValueSurface::SingleSeries)
            .map(|r| 1.0 - r.p_value)
            .unwrap_or(0.0);

        let result = CointegrationResult {
            pair: candidate.pair().clone(),
            method,
            test_statistic,
            p_value,
            hedge_ratio,
            intercept,
            half_life,
            mean_reverting: half_life.is_some(),
            is_cointegrated: p_value <= self.pvalue_threshold,
            spread_mean: stats::mean(&spread),
            spread_std,
            stationarity_score,
            observations: aligned.len(),
        };
        tracing::debug!(
            "{} {}: stat={:.3} p={:.4} beta={:.4} half_life={:?}",
            result.pair,
            result.method,
            result.test_statistic,
            result.p_value,
            result.hedge_ratio,
            result.half_life
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::SeriesAligner;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use pair_core::PriceSeries;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let obs = closes
            .iter()
            .enumerate()
            .map(|(i, c)| (start + Duration::days(i as i64), *c))
            .collect();
        PriceSeries::from_unsorted(symbol, obs).unwrap()
    }

    fn setup(a: &[f64], b: &[f64]) -> (PairCandidate, AlignedPair) {
        let aligned = SeriesAligner::align_pair(&series("AAA", a), &series("BBB", b));
        let candidate = PairCandidate::new(
            aligned.pair.clone(),
            0.9,
            aligned.start().unwrap(),
            aligned.end().unwrap(),
            aligned.len(),
        )
        .unwrap();
        (candidate, aligned)
    }

    fn cointegrated_prices(seed: u64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut level: f64 = 50.0;
        let b: Vec<f64> = (0..n)
            .map(|_| {
                level += rng.gen_range(-1.0..1.0);
                level.max(5.0)
            })
            .collect();
        let a: Vec<f64> = b.iter().map(|x| 2.0 * x + 5.0 + rng.gen_range(-0.5..0.5)).collect();
        (a, b)
    }

    #[test]
    fn test_engle_granger_recovers_hedge_ratio() {
        let (a, b) = cointegrated_prices(1, 250);
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::EngleGranger, 0.05, 60);
        let result = tester.test(&candidate, &aligned).unwrap();
        assert_relative_eq!(result.hedge_ratio, 2.0, epsilon = 0.05);
        assert!(result.p_value < 0.05, "p={}", result.p_value);
        assert!(result.is_cointegrated);
        assert!(result.mean_reverting);
        assert!(result.half_life.unwrap() < 5.0);
        assert!(result.stationarity_score > 0.95);
        assert_eq!(result.method, CointegrationMethod::EngleGranger);
        assert_eq!(result.observations, 250);
    }

    #[test]
    fn test_johansen_agrees_on_cointegrated_pair() {
        let (a, b) = cointegrated_prices(2, 250);
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::Johansen, 0.05, 60);
        let result = tester.test(&candidate, &aligned).unwrap();
        assert!(result.is_cointegrated);
        assert_relative_eq!(result.hedge_ratio, 2.0, epsilon = 0.1);
        assert!(result.spread_mean.abs() < 1e-9);
        assert_eq!(result.method, CointegrationMethod::Johansen);
    }

    /// `b = a + 0.8 sin(2πt/21)` plus a little noise, on a slow walk.
    fn sinusoid_prices(seed: u64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut level = 50.0;
        let a: Vec<f64> = (0..n)
            .map(|_| {
                level += rng.gen_range(-0.1..0.1);
                level
            })
            .collect();
        let b = a
            .iter()
            .enumerate()
            .map(|(t, x)| {
                let phase = 2.0 * std::f64::consts::PI * t as f64 / 21.0;
                x + 0.8 * phase.sin() + rng.gen_range(-0.05..0.05)
            })
            .collect();
        (a, b)
    }

    #[test]
    fn test_combined_keeps_the_lower_p_value() {
        for seed in 0..5 {
            let (a, b) = sinusoid_prices(seed, 252);
            let (candidate, aligned) = setup(&a, &b);
            let run = |method| CointegrationTester::new(method, 0.05, 60).test(&candidate, &aligned).unwrap();
            let eg = run(CointegrationMethod::EngleGranger);
            let jo = run(CointegrationMethod::Johansen);
            let both = run(CointegrationMethod::Combined);

            let winner = if jo.p_value < eg.p_value { &jo } else { &eg };
            assert_eq!(both.p_value, eg.p_value.min(jo.p_value));
            assert_eq!(both.method, winner.method);
            assert_eq!(both.hedge_ratio, winner.hedge_ratio);
            assert_eq!(both.test_statistic, winner.test_statistic);
            // Either test passing is enough.
            assert_eq!(both.is_cointegrated, eg.is_cointegrated || jo.is_cointegrated);
            assert!(jo.is_cointegrated, "seed {}: johansen p={}", seed, jo.p_value);
            assert!(both.is_cointegrated);
        }
    }

    #[test]
    fn test_combined_reports_engle_granger_on_clean_pair() {
        let (a, b) = cointegrated_prices(4, 250);
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::Combined, 0.05, 60);
        let result = tester.test(&candidate, &aligned).unwrap();
        assert_eq!(result.method, CointegrationMethod::EngleGranger);
        assert!(result.p_value < 0.01);
        assert_relative_eq!(result.hedge_ratio, 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_combined_fails_only_when_both_tests_fail() {
        let b: Vec<f64> = (0..100).map(|i| 10.0 + (i as f64 * 0.2).sin()).collect();
        let a: Vec<f64> = b.iter().map(|x| 3.0 * x).collect();
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::Combined, 0.05, 60);
        assert!(matches!(
            tester.test(&candidate, &aligned),
            Err(PairError::RegressionDegenerate(_))
        ));
    }

    #[test]
    fn test_constant_second_leg_is_degenerate() {
        let a: Vec<f64> = (0..100).map(|i| 10.0 + (i as f64 * 0.2).sin()).collect();
        let b = vec![25.0; 100];
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::EngleGranger, 0.05, 60);
        assert!(matches!(
            tester.test(&candidate, &aligned),
            Err(PairError::RegressionDegenerate(_))
        ));
    }

    #[test]
    fn test_exact_multiple_is_degenerate() {
        let b: Vec<f64> = (0..100).map(|i| 10.0 + (i as f64 * 0.2).sin()).collect();
        let a: Vec<f64> = b.iter().map(|x| 3.0 * x).collect();
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::EngleGranger, 0.05, 60);
        assert!(matches!(
            tester.test(&candidate, &aligned),
            Err(PairError::RegressionDegenerate(_))
        ));
    }

    #[test]
    fn test_short_window_is_insufficient() {
        let (a, b) = cointegrated_prices(3, 40);
        let (candidate, aligned) = setup(&a, &b);
        let tester = CointegrationTester::new(CointegrationMethod::EngleGranger, 0.05, 60);
        assert_eq!(
            tester.test(&candidate, &aligned).unwrap_err(),
            PairError::InsufficientHistory { required: 60, actual: 40 }
        );
    }

    #[test]
    fn test_half_life_of_ar1() {
        // eps_t = 0.5 eps_{t-1}: lambda = -0.5, half-life = ln2 / ln2 = 1.
        let spread: Vec<f64> = (0..20).map(|i| 0.5f64.powi(i)).collect();
        assert_relative_eq!(half_life(&spread).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_half_life_is_capped_at_a_trading_year() {
        // lambda = -0.001: uncapped half-life is about 693 periods.
        let spread: Vec<f64> = (0..200).map(|i| 0.999f64.powi(i)).collect();
        assert_eq!(half_life(&spread), Some(MAX_HALF_LIFE));

        let quick: Vec<f64> = (0..200).map(|i| 0.9f64.powi(i)).collect();
        assert!(half_life(&quick).unwrap() < MAX_HALF_LIFE);
    }

    #[test]
    fn test_half_life_undefined_without_reversion() {
        let trending: Vec<f64> = (1..50).map(|i| i as f64).collect();
        assert_eq!(half_life(&trending), None);
        assert_eq!(half_life(&[0.0; 10]), None);
    }

    #[test]
    fn test_half_life_floors_overshoot() {
        // Alternating sign: lambda = -2, 1 + lambda < 0 is floored.
        let spread: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let hl = half_life(&spread).unwrap();
        assert!(hl > 0.0 && hl < 0.1);
    }
}
