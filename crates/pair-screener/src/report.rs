use std::cmp::Ordering;

use backtest_engine::{EquityPoint, Trade};
use chrono::NaiveDate;
use pair_core::{CointegrationMethod, Horizon, PairKey, ReasonCode, ScreeningConfig};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::scorer::ScoreComponents;

/// One scored pair in a horizon's table: the record report and chart
/// collaborators consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRecord {
    pub horizon: String,
    pub pair: PairKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub correlation: f64,
    /// Test whose statistics are reported; under `combined` the one that admitted the pair.
    pub method: CointegrationMethod,
    pub p_value: f64,
    pub test_statistic: f64,
    pub hedge_ratio: f64,
    pub intercept: f64,
    pub half_life: Option<f64>,
    pub stationarity_score: f64,
    pub total_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub score: f64,
    pub components: ScoreComponents,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// A pair that did not reach the scored table, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedPair {
    pub pair: PairKey,
    pub reason: ReasonCode,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonReport {
    pub horizon: Horizon,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub symbols: usize,
    pub pairs_enumerated: usize,
    pub candidates: usize,
    /// Candidates whose p-value cleared the threshold.
    pub cointegrated: usize,
    /// Cointegrated pairs that also passed the half-life filters.
    pub admitted: usize,
    /// Admitted pairs dropped by `max_pairs_per_period`.
    pub over_cap: usize,
    /// Ranked by score, then trade count, then pair.
    pub records: Vec<PairRecord>,
    pub excluded: Vec<ExcludedPair>,
}

/// Entry of the cross-horizon ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPair {
    pub rank: usize,
    pub horizon: String,
    pub pair: PairKey,
    pub score: f64,
    pub trade_count: usize,
    pub total_return: f64,
    pub sharpe: f64,
}

/// Averages over a horizon's scored pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PairStatistics {
    pub pairs: usize,
    pub avg_correlation: f64,
    pub avg_p_value: f64,
    /// Over pairs with a defined half-life only.
    pub avg_half_life: Option<f64>,
    pub avg_stationarity: f64,
    pub correlation_range: Option<(f64, f64)>,
    pub p_value_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonSummary {
    pub horizon: String,
    pub candidates: usize,
    pub cointegrated: usize,
    pub admitted: usize,
    pub scored: usize,
    pub excluded: usize,
    pub average_score: f64,
    pub best: Option<RankedPair>,
    pub statistics: PairStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub horizons: Vec<HorizonSummary>,
    /// Best ten across every horizon.
    pub top_pairs: Vec<RankedPair>,
    pub total_scored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub method: CointegrationMethod,
    pub config: ScreeningConfig,
    pub symbols_analyzed: usize,
    pub missing_symbols: Vec<String>,
    pub horizons: Vec<HorizonReport>,
    pub global_ranking: Vec<RankedPair>,
    pub summary: AnalysisSummary,
    pub cache: CacheStats,
}

pub const TOP_PAIRS: usize = 10;

/// Score descending, then trade count descending, then pair symbols.
pub fn rank_order(a_score: f64, a_trades: usize, a_pair: &PairKey, b_score: f64, b_trades: usize, b_pair: &PairKey) -> Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| b_trades.cmp(&a_trades))
        .then_with(|| a_pair.cmp(b_pair))
}

pub fn rank_records(records: &mut [PairRecord]) {
    records.sort_by(|a, b| rank_order(a.score, a.trade_count, &a.pair, b.score, b.trade_count, &b.pair));
}

fn ranked(rank: usize, r: &PairRecord) -> RankedPair {
    RankedPair {
        rank,
        horizon: r.horizon.clone(),
        pair: r.pair.clone(),
        score: r.score,
        trade_count: r.trade_count,
        total_return: r.total_return,
        sharpe: r.sharpe,
    }
}

/// Every horizon's records in one ranking. Horizon order breaks the remaining ties.
pub fn global_ranking(horizons: &[HorizonReport]) -> Vec<RankedPair> {
    let mut all: Vec<(usize, &PairRecord)> = horizons
        .iter()
        .enumerate()
        .flat_map(|(h, report)| report.records.iter().map(move |r| (h, r)))
        .collect();
    all.sort_by(|(ha, a), (hb, b)| {
        rank_order(a.score, a.trade_count, &a.pair, b.score, b.trade_count, &b.pair).then_with(|| ha.cmp(hb))
    });
    all.into_iter().enumerate().map(|(i, (_, r))| ranked(i + 1, r)).collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

pub fn pair_statistics(records: &[PairRecord]) -> PairStatistics {
    PairStatistics {
        pairs: records.len(),
        avg_correlation: mean(records.iter().map(|r| r.correlation)).unwrap_or(0.0),
        avg_p_value: mean(records.iter().map(|r| r.p_value)).unwrap_or(0.0),
        avg_half_life: mean(records.iter().filter_map(|r| r.half_life)),
        avg_stationarity: mean(records.iter().map(|r| r.stationarity_score)).unwrap_or(0.0),
        correlation_range: range(records.iter().map(|r| r.correlation)),
        p_value_range: range(records.iter().map(|r| r.p_value)),
    }
}

pub fn summarize(horizons: &[HorizonReport], global: &[RankedPair]) -> AnalysisSummary {
    let per_horizon = horizons
        .iter()
        .map(|h| HorizonSummary {
            horizon: h.horizon.label.clone(),
            candidates: h.candidates,
            cointegrated: h.cointegrated,
            admitted: h.admitted,
            scored: h.records.len(),
            excluded: h.excluded.len(),
            average_score: mean(h.records.iter().map(|r| r.score)).unwrap_or(0.0),
            best: h.records.first().map(|r| ranked(1, r)),
            statistics: pair_statistics(&h.records),
        })
        .collect();
    AnalysisSummary {
        horizons: per_horizon,
        top_pairs: global.iter().take(TOP_PAIRS).cloned().collect(),
        total_scored: global.len(),
    }
}
