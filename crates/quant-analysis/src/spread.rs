use pair_core::stats;
use pair_core::{CointegrationResult, PairError, SpreadPoint, SpreadSeries, ZScoreMode};

use crate::alignment::AlignedPair;

fn zscore(value: f64, mean: f64, std: f64) -> f64 {
    if std <= stats::VARIANCE_EPSILON * mean.abs().max(1.0) {
        0.0
    } else {
        (value - mean) / std
    }
}

/// Trailing-window z-scores. Each value uses only the `window` observations
/// ending at its own index; the first `window - 1` are 0.
pub fn rolling_zscores(spread: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(2);
    spread
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            if i + 1 < window {
                return 0.0;
            }
            let slice = &spread[i + 1 - window..=i];
            zscore(value, stats::mean(slice), stats::std_dev(slice))
        })
        .collect()
}

/// Z-scores against the mean and sample deviation of the whole series.
pub fn static_zscores(spread: &[f64]) -> Vec<f64> {
    let mean = stats::mean(spread);
    let std = stats::std_dev(spread);
    spread.iter().map(|&v| zscore(v, mean, std)).collect()
}

/// Turns a cointegration result and its aligned prices into a z-scored spread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadModel {
    mode: ZScoreMode,
}

impl SpreadModel {
    pub fn new(mode: ZScoreMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ZScoreMode {
        self.mode
    }

    pub fn build(&self, result: &CointegrationResult, aligned: &AlignedPair) -> Result<SpreadSeries, PairError> {
        if result.pair != aligned.pair {
            return Err(PairError::InvalidSeries(format!(
                "cointegration result for {} applied to prices of {}",
                result.pair, aligned.pair
            )));
        }
        if aligned.is_empty() {
            return Err(PairError::InsufficientHistory { required: 1, actual: 0 });
        }

        let spread: Vec<f64> = aligned
            .first
            .iter()
            .zip(&aligned.second)
            .map(|(a, b)| a - result.hedge_ratio * b - result.intercept)
            .collect();
        let zscores = match self.mode.window_for(spread.len()) {
            Some(window) => rolling_zscores(&spread, window),
            None => static_zscores(&spread),
        };

        let points = aligned
            .dates
            .iter()
            .enumerate()
            .map(|(i, &date)| SpreadPoint {
                date,
                price_first: aligned.first[i],
                price_second: aligned.second[i],
                spread: spread[i],
                zscore: zscores[i],
            })
            .collect();
        SpreadSeries::new(result.pair.clone(), result.hedge_ratio, self.mode, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use pair_core::{CointegrationMethod, PairKey};

    fn aligned(first: Vec<f64>, second: Vec<f64>) -> AlignedPair {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        AlignedPair {
            pair: PairKey::new("AAA", "BBB"),
            dates: (0..first.len()).map(|i| start + Duration::days(i as i64)).collect(),
            first,
            second,
        }
    }

    fn result(hedge_ratio: f64, intercept: f64) -> CointegrationResult {
        CointegrationResult {
            pair: PairKey::new("AAA", "BBB"),
            method: CointegrationMethod::EngleGranger,
            test_statistic: -4.0,
            p_value: 0.01,
            hedge_ratio,
            intercept,
            half_life: Some(3.0),
            mean_reverting: true,
            is_cointegrated: true,
            spread_mean: 0.0,
            spread_std: 1.0,
            stationarity_score: 0.99,
            observations: 0,
        }
    }

    #[test]
    fn test_spread_uses_hedge_and_intercept() {
        let data = aligned(vec![10.0, 12.0, 14.0], vec![4.0, 5.0, 5.0]);
        let spread = SpreadModel::new(ZScoreMode::Static).build(&result(2.0, 1.0), &data).unwrap();
        let values: Vec<f64> = spread.points().iter().map(|p| p.spread).collect();
        assert_eq!(values, vec![1.0, 1.0, 3.0]);
        assert_eq!(spread.hedge_ratio(), 2.0);
    }

    #[test]
    fn test_rolling_warmup_is_zero() {
        let spread: Vec<f64> = (0..10).map(|i| (i as f64).sin()).collect();
        let z = rolling_zscores(&spread, 4);
        assert_eq!(&z[..3], &[0.0, 0.0, 0.0]);
        let window = &spread[0..4];
        let expected = (spread[3] - stats::mean(window)) / stats::std_dev(window);
        assert_relative_eq!(z[3], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_has_no_look_ahead() {
        let base: Vec<f64> = (0..80).map(|i| (i as f64 * 0.37).sin() * 2.0).collect();
        let mut shocked = base.clone();
        for v in shocked.iter_mut().skip(50) {
            *v += 100.0;
        }
        let before = rolling_zscores(&base, 20);
        let after = rolling_zscores(&shocked, 20);
        assert_eq!(&before[..50], &after[..50]);
        assert_ne!(before[50], after[50]);
    }

    #[test]
    fn test_flat_window_scores_zero() {
        let spread = vec![3.0; 30];
        assert!(rolling_zscores(&spread, 10).iter().all(|z| *z == 0.0));
        assert!(static_zscores(&spread).iter().all(|z| *z == 0.0));
    }

    #[test]
    fn test_static_zscores_are_standardised() {
        let spread: Vec<f64> = (0..50).map(|i| (i as f64 * 0.5).cos()).collect();
        let z = static_zscores(&spread);
        assert_relative_eq!(stats::mean(&z), 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats::std_dev(&z), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_adaptive_window_on_six_month_spread() {
        // 126 rows: window min(60, 31) = 31, so signals start at index 30.
        let first: Vec<f64> = (0..126).map(|i| 50.0 + (i as f64 * 0.6).sin() * 3.0).collect();
        let second = vec![20.0; 126];
        let data = aligned(first, second);
        let adaptive = SpreadModel::default().build(&result(1.0, 0.0), &data).unwrap();
        let z = adaptive.zscores();

        assert!(z[..30].iter().all(|v| *v == 0.0));
        assert!(z[30] != 0.0);
        let spread: Vec<f64> = adaptive.points().iter().map(|p| p.spread).collect();
        assert_eq!(z, rolling_zscores(&spread, 31));

        let fixed = SpreadModel::new(ZScoreMode::Rolling { window: 60 })
            .build(&result(1.0, 0.0), &data)
            .unwrap();
        assert!(fixed.zscores()[..59].iter().all(|v| *v == 0.0));
        let live = |zs: &[f64]| zs.iter().filter(|v| v.abs() > 1.0).count();
        assert!(live(&z) > live(&fixed.zscores()));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let mut data = aligned(vec![1.0, 2.0], vec![1.0, 2.0]);
        data.pair = PairKey::new("CCC", "DDD");
        assert!(SpreadModel::default().build(&result(1.0, 0.0), &data).is_err());
    }
}
