use backtest_engine::{BacktestResult, BacktestSimulator, PerformanceEvaluator};
use pair_core::{CointegrationResult, PairError, ReasonCode, ScreeningConfig};
use quant_analysis::{CointegrationTester, ScreenedPair, SpreadModel};
use serde::Serialize;

use crate::scorer::{PairScorer, PeriodScore};

/// Backtest and score of one cointegrated pair over one horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairEvaluation {
    pub backtest: BacktestResult,
    pub score: PeriodScore,
}

/// Per-pair stages after the correlation screen: cointegration, admission
/// filters, spread, simulation, metrics and score. Holds no mutable state,
/// so one instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct PairPipeline {
    tester: CointegrationTester,
    spread: SpreadModel,
    simulator: BacktestSimulator,
    evaluator: PerformanceEvaluator,
    scorer: PairScorer,
    max_half_life: Option<f64>,
    require_mean_reversion: bool,
}

impl PairPipeline {
    pub fn from_config(config: &ScreeningConfig) -> Result<Self, PairError> {
        Ok(Self {
            tester: CointegrationTester::from_config(config),
            spread: SpreadModel::new(config.zscore_mode),
            simulator: BacktestSimulator::from_config(config)?,
            evaluator: PerformanceEvaluator::new(),
            scorer: PairScorer::new(),
            max_half_life: config.max_half_life,
            require_mean_reversion: config.require_mean_reversion,
        })
    }

    pub fn cointegrate(&self, pair: &ScreenedPair) -> Result<CointegrationResult, PairError> {
        self.tester.test(&pair.candidate, &pair.aligned)
    }

    /// Whether a tested pair goes on to backtesting.
    ///
    /// A missing half-life only rejects when mean reversion is required.
    pub fn admit(&self, result: &CointegrationResult) -> Result<(), ReasonCode> {
        if !result.is_cointegrated {
            return Err(ReasonCode::NotCointegrated);
        }
        if self.require_mean_reversion && !result.mean_reverting {
            return Err(ReasonCode::HalfLifeRejected);
        }
        match (self.max_half_life, result.half_life) {
            (Some(max), Some(hl)) if hl > max => Err(ReasonCode::HalfLifeRejected),
            _ => Ok(()),
        }
    }

    pub fn evaluate(
        &self,
        pair: &ScreenedPair,
        result: &CointegrationResult,
        horizon: &str,
    ) -> Result<PairEvaluation, PairError> {
        let spread = self.spread.build(result, &pair.aligned)?;
        let run = self.simulator.run(&spread)?;
        let backtest = self.evaluator.evaluate(&spread, run);
        let score = self
            .scorer
            .score(&result.pair, horizon, &backtest.metrics, pair.candidate.correlation());
        Ok(PairEvaluation { backtest, score })
    }
}
