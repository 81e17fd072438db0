use std::sync::Arc;

use chrono::NaiveDate;
use pair_core::{CointegrationResult, Horizon, PairError, PairKey, ReasonCode, ScreeningConfig};
use quant_analysis::{CorrelationFilter, ScreenedPair};
use rayon::prelude::*;

use crate::cache::{AnalysisCache, CacheKey};
use crate::error::Result;
use crate::pipeline::{PairEvaluation, PairPipeline};
use crate::report::*;
use crate::universe::Universe;

/// Runs the full screen once per horizon and ranks the results.
///
/// Horizons share nothing but the universe. Within a horizon the correlation
/// screen, cointegration tests and backtests fan out over rayon; results are
/// collected back in pair order so output never depends on scheduling.
pub struct PeriodAggregator {
    config: ScreeningConfig,
    pipeline: PairPipeline,
    cache: Arc<AnalysisCache>,
    pool: Option<rayon::ThreadPool>,
}

impl PeriodAggregator {
    /// Validates the configuration; this is the only fatal check of a run.
    pub fn new(config: ScreeningConfig) -> Result<Self> {
        Self::with_cache(config, Arc::new(AnalysisCache::new()))
    }

    /// Reuse a cache across aggregators, e.g. for reruns with edited parameters.
    pub fn with_cache(config: ScreeningConfig, cache: Arc<AnalysisCache>) -> Result<Self> {
        config.validate()?;
        let pipeline = PairPipeline::from_config(&config)?;
        let pool = match config.max_workers {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };
        cache.prepare(config.analysis_fingerprint());
        Ok(Self {
            config,
            pipeline,
            cache,
            pool,
        })
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
        self.cache.prepare(self.config.analysis_fingerprint());
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    pub fn run(&self, universe: &Universe) -> AnalysisReport {
        // A shared cache may have been bound to other parameters since construction.
        self.cache.prepare(self.config.analysis_fingerprint());
        let universe = universe.capped(self.config.max_stocks);
        tracing::info!(
            "Screening {} symbols over {} horizons ({} method)",
            universe.len(),
            self.config.horizons.len(),
            self.config.method
        );

        let horizons: Vec<HorizonReport> = match universe.latest_date() {
            Some(end) => self
                .config
                .horizons
                .iter()
                .map(|h| self.analyze_horizon(&universe, h, end))
                .collect(),
            None => Vec::new(),
        };

        let global = global_ranking(&horizons);
        let summary = summarize(&horizons, &global);
        let cache = self.cache.stats();
        tracing::info!(
            "Screen complete: {} scored pairs across horizons (cache: {} hits, {} misses)",
            global.len(),
            cache.hits,
            cache.misses
        );

        AnalysisReport {
            method: self.config.method,
            config: self.config.clone(),
            symbols_analyzed: universe.len(),
            missing_symbols: universe.missing().to_vec(),
            horizons,
            global_ranking: global,
            summary,
            cache,
        }
    }

    pub fn analyze_horizon(&self, universe: &Universe, horizon: &Horizon, end: NaiveDate) -> HorizonReport {
        let start = horizon.start_from(end);
        let window = universe.window(start);
        let filter = CorrelationFilter::new(self.config.correlation_threshold, self.config.min_observations);
        let fingerprint = self.config.analysis_fingerprint();
        let key = |screened: &ScreenedPair| CacheKey {
            pair: screened.candidate.pair().clone(),
            horizon: horizon.clone(),
            window_end: end,
            data: screened.aligned.digest(),
            fingerprint,
        };

        let (screen, tested) = self.install(|| {
            let screen = filter.screen(&window);
            let tested: Vec<Arc<std::result::Result<CointegrationResult, PairError>>> = screen
                .candidates
                .par_iter()
                .map(|c| {
                    self.cache
                        .cointegration_or_insert_with(key(c), || self.pipeline.cointegrate(c))
                })
                .collect();
            (screen, tested)
        });

        let mut excluded: Vec<ExcludedPair> = screen
            .excluded
            .iter()
            .map(|(pair, err)| exclusion(pair, err.code(), err.to_string()))
            .collect();

        let mut cointegrated = 0;
        let mut admitted: Vec<(&ScreenedPair, &CointegrationResult)> = Vec::new();
        for (candidate, outcome) in screen.candidates.iter().zip(&tested) {
            let pair = candidate.candidate.pair();
            match outcome.as_ref() {
                Err(err) => excluded.push(exclusion(pair, err.code(), err.to_string())),
                Ok(result) => {
                    if result.is_cointegrated {
                        cointegrated += 1;
                    }
                    match self.pipeline.admit(result) {
                        Ok(()) => admitted.push((candidate, result)),
                        Err(reason) => excluded.push(exclusion(
                            pair,
                            reason,
                            format!(
                                "{} p={:.4} half_life={:?}",
                                result.method, result.p_value, result.half_life
                            ),
                        )),
                    }
                }
            }
        }
        let admitted_count = admitted.len();

        backtest_order(&mut admitted);
        let over_cap = admitted.len().saturating_sub(self.config.max_pairs_per_period);
        admitted.truncate(self.config.max_pairs_per_period);

        let evaluated: Vec<Arc<std::result::Result<PairEvaluation, PairError>>> = self.install(|| {
            admitted
                .par_iter()
                .map(|(candidate, result)| {
                    self.cache.evaluation_or_insert_with(key(candidate), || {
                        self.pipeline.evaluate(candidate, result, &horizon.label)
                    })
                })
                .collect()
        });

        let mut records = Vec::with_capacity(evaluated.len());
        for ((candidate, result), outcome) in admitted.iter().zip(&evaluated) {
            match outcome.as_ref() {
                Ok(evaluation) => records.push(self.record(universe, horizon, candidate, result, evaluation)),
                Err(err) => excluded.push(exclusion(&result.pair, err.code(), err.to_string())),
            }
        }
        rank_records(&mut records);
        excluded.sort_by(|a, b| a.pair.cmp(&b.pair).then_with(|| a.reason.cmp(&b.reason)));

        tracing::info!(
            "[{}] {} -> {}: {} candidates, {} cointegrated, {} admitted, {} scored, {} excluded",
            horizon.label,
            start,
            end,
            screen.candidates.len(),
            cointegrated,
            admitted_count,
            records.len(),
            excluded.len()
        );

        HorizonReport {
            horizon: horizon.clone(),
            window_start: start,
            window_end: end,
            symbols: window.values().filter(|s| !s.is_empty()).count(),
            pairs_enumerated: screen.pairs_enumerated,
            candidates: screen.candidates.len(),
            cointegrated,
            admitted: admitted_count,
            over_cap,
            records,
            excluded,
        }
    }

    fn record(
        &self,
        universe: &Universe,
        horizon: &Horizon,
        candidate: &ScreenedPair,
        result: &CointegrationResult,
        evaluation: &PairEvaluation,
    ) -> PairRecord {
        let metrics = &evaluation.backtest.metrics;
        PairRecord {
            horizon: horizon.label.clone(),
            pair: result.pair.clone(),
            first_name: universe.name_of(&result.pair.first).map(str::to_string),
            second_name: universe.name_of(&result.pair.second).map(str::to_string),
            correlation: candidate.candidate.correlation(),
            method: result.method,
            p_value: result.p_value,
            test_statistic: result.test_statistic,
            hedge_ratio: result.hedge_ratio,
            intercept: result.intercept,
            half_life: result.half_life,
            stationarity_score: result.stationarity_score,
            total_return: metrics.total_return,
            sharpe: metrics.sharpe_ratio,
            max_drawdown: metrics.max_drawdown,
            win_rate: metrics.win_rate,
            trade_count: metrics.trade_count,
            score: evaluation.score.score,
            components: evaluation.score.components,
            trades: evaluation.backtest.trades.clone(),
            equity_curve: evaluation.backtest.equity_curve.clone(),
        }
    }
}

/// Order in which admitted pairs claim the per-horizon backtest slots:
/// lowest p-value first, then strongest |correlation|, then symbols.
pub(crate) fn backtest_order(admitted: &mut [(&ScreenedPair, &CointegrationResult)]) {
    admitted.sort_by(|(ca, ra), (cb, rb)| {
        ra.p_value
            .total_cmp(&rb.p_value)
            .then_with(|| {
                cb.candidate
                    .correlation()
                    .abs()
                    .total_cmp(&ca.candidate.correlation().abs())
            })
            .then_with(|| ra.pair.cmp(&rb.pair))
    });
}

fn exclusion(pair: &PairKey, reason: ReasonCode, detail: String) -> ExcludedPair {
    match reason {
        ReasonCode::RegressionDegenerate | ReasonCode::InvalidSeries => {
            tracing::warn!("{} excluded ({}): {}", pair, reason, detail)
        }
        _ => tracing::debug!("{} excluded ({}): {}", pair, reason, detail),
    }
    ExcludedPair {
        pair: pair.clone(),
        reason,
        detail,
    }
}
