use pair_core::stats::{self, VARIANCE_EPSILON};
use pair_core::SpreadSeries;

use crate::engine::INITIAL_EQUITY;
use crate::models::*;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics over a simulator run.
///
/// Every metric is derived from the same equity curve and trade log the
/// simulator produced; nothing is re-simulated. Degenerate inputs yield 0,
/// never NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceEvaluator;

impl PerformanceEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, spread: &SpreadSeries, run: SimulationRun) -> BacktestResult {
        let metrics = self.metrics(&run);
        BacktestResult {
            pair: spread.pair().clone(),
            hedge_ratio: spread.hedge_ratio(),
            trades: run.trades,
            equity_curve: run.equity_curve,
            metrics,
        }
    }

    pub fn metrics(&self, run: &SimulationRun) -> PerformanceMetrics {
        let curve: Vec<f64> = run.equity_curve.iter().map(|p| p.equity).collect();
        let trade_count = run.trades.len();
        let winning_trades = run.trades.iter().filter(|t| t.is_win()).count();

        let total_return = curve.last().map_or(0.0, |last| last / INITIAL_EQUITY - 1.0);
        let sharpe_ratio = if trade_count == 0 {
            0.0
        } else {
            sharpe(&stats::simple_returns(&curve))
        };

        let (avg_trade_return, avg_holding_periods, win_rate) = if trade_count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let n = trade_count as f64;
            (
                run.trades.iter().map(|t| t.realized_return()).sum::<f64>() / n,
                run.trades.iter().map(|t| t.holding_periods() as f64).sum::<f64>() / n,
                winning_trades as f64 / n,
            )
        };
        let exposure = if curve.is_empty() {
            0.0
        } else {
            run.equity_curve.iter().filter(|p| p.state != PositionState::Flat).count() as f64 / curve.len() as f64
        };

        PerformanceMetrics {
            total_return: finite_or_zero(total_return),
            sharpe_ratio,
            max_drawdown: finite_or_zero(stats::max_drawdown(&curve)),
            win_rate,
            trade_count,
            winning_trades,
            forced_exits: run.trades.iter().filter(|t| t.is_forced()).count(),
            avg_trade_return: finite_or_zero(avg_trade_return),
            avg_holding_periods,
            exposure,
        }
    }
}

/// mean / sample std of daily returns, annualised.
pub fn sharpe(returns: &[f64]) -> f64 {
    let std = stats::std_dev(returns);
    if returns.len() < 2 || std <= VARIANCE_EPSILON {
        return 0.0;
    }
    finite_or_zero(stats::mean(returns) / std * TRADING_DAYS_PER_YEAR.sqrt())
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
