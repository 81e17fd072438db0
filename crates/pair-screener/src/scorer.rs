use backtest_engine::PerformanceMetrics;
use pair_core::PairKey;
use serde::{Deserialize, Serialize};

/// Composite weights. They sum to 1, so the composite stays in [0, 100].
pub const RETURN_WEIGHT: f64 = 0.30;
pub const SHARPE_WEIGHT: f64 = 0.25;
pub const DRAWDOWN_WEIGHT: f64 = 0.20;
pub const WIN_RATE_WEIGHT: f64 = 0.15;
pub const CORRELATION_WEIGHT: f64 = 0.10;

/// Each metric mapped onto 0-100 with fixed scales:
/// return 0% -> 50 and +20% -> 100, Sharpe 0 -> 50 and 2 -> 100,
/// drawdown 0% -> 100 and -20% -> 0, win rate and |correlation| linear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub total_return: f64,
    pub sharpe: f64,
    pub drawdown: f64,
    pub win_rate: f64,
    pub correlation: f64,
}

/// Score of one pair over one horizon, with the raw values it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodScore {
    pub pair: PairKey,
    pub horizon: String,
    /// Weighted composite in [0, 100], rounded to two decimals.
    pub score: f64,
    pub components: ScoreComponents,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub correlation: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PairScorer;

fn clip(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

impl PairScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn components(&self, metrics: &PerformanceMetrics, correlation: f64) -> ScoreComponents {
        ScoreComponents {
            total_return: clip(50.0 + finite(metrics.total_return) * 250.0),
            sharpe: clip(50.0 + finite(metrics.sharpe_ratio) * 25.0),
            drawdown: clip(100.0 - finite(metrics.max_drawdown).abs() * 500.0),
            win_rate: clip(finite(metrics.win_rate) * 100.0),
            correlation: clip(finite(correlation).abs() * 100.0),
        }
    }

    pub fn composite(&self, c: &ScoreComponents) -> f64 {
        let raw = RETURN_WEIGHT * c.total_return
            + SHARPE_WEIGHT * c.sharpe
            + DRAWDOWN_WEIGHT * c.drawdown
            + WIN_RATE_WEIGHT * c.win_rate
            + CORRELATION_WEIGHT * c.correlation;
        ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
    }

    pub fn score(&self, pair: &PairKey, horizon: &str, metrics: &PerformanceMetrics, correlation: f64) -> PeriodScore {
        let components = self.components(metrics, correlation);
        PeriodScore {
            pair: pair.clone(),
            horizon: horizon.to_string(),
            score: self.composite(&components),
            components,
            total_return: metrics.total_return,
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown: metrics.max_drawdown,
            win_rate: metrics.win_rate,
            correlation,
            trade_count: metrics.trade_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn metrics(total_return: f64, sharpe_ratio: f64, max_drawdown: f64, win_rate: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            total_return,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            trade_count: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total = RETURN_WEIGHT + SHARPE_WEIGHT + DRAWDOWN_WEIGHT + WIN_RATE_WEIGHT + CORRELATION_WEIGHT;
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_scales() {
        let c = PairScorer::new().components(&metrics(0.10, 1.0, -0.10, 0.6), 0.9);
        assert_relative_eq!(c.total_return, 75.0, epsilon = 1e-9);
        assert_relative_eq!(c.sharpe, 75.0, epsilon = 1e-9);
        assert_relative_eq!(c.drawdown, 50.0, epsilon = 1e-9);
        assert_relative_eq!(c.win_rate, 60.0, epsilon = 1e-9);
        assert_relative_eq!(c.correlation, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_composite_is_weighted_and_rounded() {
        let scorer = PairScorer::new();
        let s = scorer.score(&PairKey::new("A", "B"), "1Y", &metrics(0.10, 1.0, -0.10, 0.6), 0.9);
        // 0.3*75 + 0.25*75 + 0.2*50 + 0.15*60 + 0.1*90
        assert_relative_eq!(s.score, 69.25, epsilon = 1e-9);
        assert_eq!(s.horizon, "1Y");
        assert_eq!(s.trade_count, 4);
    }

    #[test]
    fn test_extremes_clip() {
        let scorer = PairScorer::new();
        let best = scorer.score(&PairKey::new("A", "B"), "6M", &metrics(5.0, 40.0, 0.0, 1.0), 1.0);
        assert_eq!(best.score, 100.0);
        let worst = scorer.score(&PairKey::new("A", "B"), "6M", &metrics(-1.0, -40.0, -0.9, 0.0), 0.0);
        assert_eq!(worst.score, 0.0);
    }

    #[test]
    fn test_non_finite_metrics_do_not_leak() {
        let scorer = PairScorer::new();
        let s = scorer.score(&PairKey::new("A", "B"), "6M", &metrics(f64::NAN, f64::INFINITY, f64::NAN, f64::NAN), f64::NAN);
        assert!(s.score.is_finite());
        assert!((0.0..=100.0).contains(&s.score));
    }

    proptest! {
        #[test]
        fn score_is_bounded(
            r in -10.0f64..10.0,
            sharpe in -50.0f64..50.0,
            dd in -1.0f64..0.0,
            win in 0.0f64..1.0,
            corr in -1.0f64..1.0,
        ) {
            let s = PairScorer::new().score(&PairKey::new("A", "B"), "2Y", &metrics(r, sharpe, dd, win), corr);
            prop_assert!((0.0..=100.0).contains(&s.score));
        }
    }
}
