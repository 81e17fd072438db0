use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::PairError;

/// One end-of-day adjusted close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Adjusted close history for a single symbol.
///
/// Dates are strictly increasing and every close is finite and positive;
/// both are checked at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, PairError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(PairError::InvalidSeries("empty symbol".to_string()));
        }
        for w in points.windows(2) {
            if w[1].date <= w[0].date {
                return Err(PairError::InvalidSeries(format!(
                    "{}: dates not strictly increasing at {}",
                    symbol, w[1].date
                )));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(PairError::InvalidSeries(format!(
                "{}: non-positive or non-finite close {} on {}",
                symbol, bad.close, bad.date
            )));
        }
        Ok(Self { symbol, points })
    }

    /// Build from (date, close) tuples, sorting by date first.
    /// Duplicate dates are still rejected.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut observations: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, PairError> {
        observations.sort_by_key(|(date, _)| *date);
        let points = observations
            .into_iter()
            .map(|(date, close)| PricePoint { date, close })
            .collect();
        Self::new(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Observations dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> PriceSeries {
        let idx = self.points.partition_point(|p| p.date < start);
        PriceSeries {
            symbol: self.symbol.clone(),
            points: self.points[idx..].to_vec(),
        }
    }
}

/// Unordered pair of symbols. `first` always sorts before `second`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// A pair that cleared the correlation pre-filter, with the aligned range it was measured on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairCandidate {
    pair: PairKey,
    correlation: f64,
    start: NaiveDate,
    end: NaiveDate,
    observations: usize,
}

impl PairCandidate {
    pub fn new(
        pair: PairKey,
        correlation: f64,
        start: NaiveDate,
        end: NaiveDate,
        observations: usize,
    ) -> Result<Self, PairError> {
        if !correlation.is_finite() || !(-1.0 - 1e-9..=1.0 + 1e-9).contains(&correlation) {
            return Err(PairError::InvalidSeries(format!(
                "{}: correlation {} outside [-1, 1]",
                pair, correlation
            )));
        }
        if end < start {
            return Err(PairError::InvalidSeries(format!(
                "{}: aligned range ends ({}) before it starts ({})",
                pair, end, start
            )));
        }
        Ok(Self {
            pair,
            correlation: correlation.clamp(-1.0, 1.0),
            start,
            end,
            observations,
        })
    }

    pub fn pair(&self) -> &PairKey {
        &self.pair
    }

    pub fn correlation(&self) -> f64 {
        self.correlation
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn observations(&self) -> usize {
        self.observations
    }
}

/// Cointegration procedure for a run, or the one behind a single result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CointegrationMethod {
    EngleGranger,
    Johansen,
    /// Run both and keep whichever gives the lower p-value. A pair passes
    /// when either test does. Results record the test that was kept.
    #[default]
    Combined,
}

impl std::fmt::Display for CointegrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CointegrationMethod::EngleGranger => f.write_str("engle_granger"),
            CointegrationMethod::Johansen => f.write_str("johansen"),
            CointegrationMethod::Combined => f.write_str("combined"),
        }
    }
}

/// Output of the cointegration stage for one pair.
///
/// The spread is `first - hedge_ratio * second - intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationResult {
    pub pair: PairKey,
    /// `EngleGranger` or `Johansen`; never `Combined`.
    pub method: CointegrationMethod,
    /// ADF tau on the residual (Engle-Granger) or the r=0 trace statistic (Johansen).
    pub test_statistic: f64,
    pub p_value: f64,
    pub hedge_ratio: f64,
    pub intercept: f64,
    /// Periods to close half the gap to the mean. `None` when the AR(1) fit shows no reversion.
    pub half_life: Option<f64>,
    pub mean_reverting: bool,
    /// p-value at or below the configured threshold.
    pub is_cointegrated: bool,
    pub spread_mean: f64,
    pub spread_std: f64,
    /// `1 - p` of a constant-term ADF test on the spread, in [0, 1].
    pub stationarity_score: f64,
    pub observations: usize,
}

/// How the spread z-score is normalised. Fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZScoreMode {
    /// Trailing window ending at (and including) each date.
    Rolling { window: usize },
    /// Trailing window of `min(max_window, len / 4)` observations, at least 2,
    /// so short horizons are not mostly warm-up.
    Adaptive { max_window: usize },
    /// Mean and deviation over the whole backtest window.
    Static,
}

impl ZScoreMode {
    pub const DEFAULT_WINDOW: usize = 60;

    /// Trailing window used on a spread of `len` observations; `None` when static.
    pub fn window_for(&self, len: usize) -> Option<usize> {
        match *self {
            ZScoreMode::Rolling { window } => Some(window),
            ZScoreMode::Adaptive { max_window } => Some(max_window.min(len / 4).max(2)),
            ZScoreMode::Static => None,
        }
    }
}

impl Default for ZScoreMode {
    fn default() -> Self {
        ZScoreMode::Adaptive {
            max_window: Self::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadPoint {
    pub date: NaiveDate,
    pub price_first: f64,
    pub price_second: f64,
    pub spread: f64,
    pub zscore: f64,
}

/// Spread and z-score per aligned date, derived from prices and a cointegration result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadSeries {
    pair: PairKey,
    hedge_ratio: f64,
    mode: ZScoreMode,
    points: Vec<SpreadPoint>,
}

impl SpreadSeries {
    pub fn new(
        pair: PairKey,
        hedge_ratio: f64,
        mode: ZScoreMode,
        points: Vec<SpreadPoint>,
    ) -> Result<Self, PairError> {
        if points.windows(2).any(|w| w[1].date <= w[0].date) {
            return Err(PairError::InvalidSeries(format!(
                "{}: spread dates not strictly increasing",
                pair
            )));
        }
        if points.iter().any(|p| !p.zscore.is_finite() || !p.spread.is_finite()) {
            return Err(PairError::InvalidSeries(format!("{}: non-finite spread value", pair)));
        }
        Ok(Self {
            pair,
            hedge_ratio,
            mode,
            points,
        })
    }

    pub fn pair(&self) -> &PairKey {
        &self.pair
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.hedge_ratio
    }

    pub fn mode(&self) -> ZScoreMode {
        self.mode
    }

    pub fn points(&self) -> &[SpreadPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn zscores(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.zscore).collect()
    }
}

/// Lookback window over which pairs are screened and backtested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Horizon {
    pub label: String,
    pub months: u32,
}

impl Horizon {
    pub fn new(label: impl Into<String>, months: u32) -> Self {
        Self {
            label: label.into(),
            months,
        }
    }

    /// Label derived from the length, e.g. "6M" or "2Y".
    pub fn from_months(months: u32) -> Self {
        let label = if months % 12 == 0 {
            format!("{}Y", months / 12)
        } else {
            format!("{}M", months)
        };
        Self { label, months }
    }

    /// 6 months, 1, 2 and 5 years.
    pub fn defaults() -> Vec<Horizon> {
        [6, 12, 24, 60].into_iter().map(Horizon::from_months).collect()
    }

    /// First calendar day covered when the window ends on `end` (30-day months).
    pub fn start_from(&self, end: NaiveDate) -> NaiveDate {
        end - Duration::days(i64::from(self.months) * 30)
    }
}

/// A symbol from the screening universe, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_price_series_rejects_duplicate_dates() {
        let points = vec![
            PricePoint { date: d(2024, 1, 2), close: 10.0 },
            PricePoint { date: d(2024, 1, 2), close: 11.0 },
        ];
        assert!(matches!(
            PriceSeries::new("AAA", points),
            Err(PairError::InvalidSeries(_))
        ));
    }

    #[test]
    fn test_price_series_rejects_non_positive_close() {
        let points = vec![
            PricePoint { date: d(2024, 1, 2), close: 10.0 },
            PricePoint { date: d(2024, 1, 3), close: 0.0 },
        ];
        assert!(PriceSeries::new("AAA", points).is_err());
    }

    #[test]
    fn test_from_unsorted_orders_by_date() {
        let series = PriceSeries::from_unsorted(
            "AAA",
            vec![(d(2024, 1, 4), 3.0), (d(2024, 1, 2), 1.0), (d(2024, 1, 3), 2.0)],
        )
        .unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.first_date(), Some(d(2024, 1, 2)));
        assert_eq!(series.last_date(), Some(d(2024, 1, 4)));
    }

    #[test]
    fn test_since_keeps_start_date() {
        let series = PriceSeries::from_unsorted(
            "AAA",
            vec![(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 2.0), (d(2024, 1, 4), 3.0)],
        )
        .unwrap();
        let window = series.since(d(2024, 1, 3));
        assert_eq!(window.closes(), vec![2.0, 3.0]);
        assert_eq!(window.symbol(), "AAA");
    }

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(PairKey::new("MSFT", "AAPL"), PairKey::new("AAPL", "MSFT"));
        assert_eq!(PairKey::new("MSFT", "AAPL").to_string(), "AAPL-MSFT");
    }

    #[test]
    fn test_candidate_rejects_out_of_range_correlation() {
        let pair = PairKey::new("A", "B");
        assert!(PairCandidate::new(pair.clone(), 1.5, d(2024, 1, 1), d(2024, 6, 1), 100).is_err());
        assert!(PairCandidate::new(pair.clone(), f64::NAN, d(2024, 1, 1), d(2024, 6, 1), 100).is_err());
        assert!(PairCandidate::new(pair, 0.9, d(2024, 6, 1), d(2024, 1, 1), 100).is_err());
    }

    #[test]
    fn test_horizon_labels_and_start() {
        let labels: Vec<String> = Horizon::defaults().into_iter().map(|h| h.label).collect();
        assert_eq!(labels, vec!["6M", "1Y", "2Y", "5Y"]);
        let h = Horizon::from_months(6);
        assert_eq!(h.start_from(d(2024, 12, 31)), d(2024, 7, 4));
    }

    #[test]
    fn test_adaptive_window_shrinks_on_short_spreads() {
        let mode = ZScoreMode::default();
        // About six months of trading days.
        assert_eq!(mode.window_for(126), Some(31));
        assert_eq!(mode.window_for(252), Some(60));
        assert_eq!(mode.window_for(5), Some(2));
        assert_eq!(ZScoreMode::Rolling { window: 60 }.window_for(126), Some(60));
        assert_eq!(ZScoreMode::Static.window_for(126), None);
    }

    #[test]
    fn test_method_serialises_snake_case() {
        assert_eq!(CointegrationMethod::default(), CointegrationMethod::Combined);
        assert_eq!(serde_json::to_string(&CointegrationMethod::Combined).unwrap(), "\"combined\"");
        assert_eq!(CointegrationMethod::EngleGranger.to_string(), "engle_granger");
    }

    #[test]
    fn test_spread_series_rejects_non_finite() {
        let pair = PairKey::new("A", "B");
        let points = vec![SpreadPoint {
            date: d(2024, 1, 2),
            price_first: 1.0,
            price_second: 1.0,
            spread: 0.0,
            zscore: f64::NAN,
        }];
        assert!(SpreadSeries::new(pair, 1.0, ZScoreMode::Static, points).is_err());
    }
}
