use chrono::NaiveDate;
use pair_core::{PairKey, SpreadPoint};
use serde::{Deserialize, Serialize};

/// Simulator state for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    Flat,
    /// Long the first leg, short `hedge_ratio` units of the second.
    LongSpread,
    /// Short the first leg, long `hedge_ratio` units of the second.
    ShortSpread,
}

impl PositionState {
    /// +1 long spread, -1 short spread, 0 flat.
    pub fn sign(self) -> f64 {
        match self {
            PositionState::Flat => 0.0,
            PositionState::LongSpread => 1.0,
            PositionState::ShortSpread => -1.0,
        }
    }
}

/// An open position, before it has an exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OpenPosition {
    pub(crate) direction: PositionState,
    pub(crate) entry_index: usize,
    pub(crate) entry_date: NaiveDate,
    pub(crate) entry_first: f64,
    pub(crate) entry_second: f64,
    pub(crate) entry_zscore: f64,
}

impl OpenPosition {
    /// Return on gross entry exposure if closed at the given prices.
    pub(crate) fn return_at(&self, hedge_ratio: f64, first: f64, second: f64) -> f64 {
        let gross = self.entry_first + hedge_ratio.abs() * self.entry_second;
        if gross <= 0.0 {
            return 0.0;
        }
        let pnl = (first - self.entry_first) - hedge_ratio * (second - self.entry_second);
        self.direction.sign() * pnl / gross
    }
}

/// A round trip. Sealed once its exit is recorded: fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    direction: PositionState,
    entry_date: NaiveDate,
    exit_date: NaiveDate,
    entry_first: f64,
    entry_second: f64,
    exit_first: f64,
    exit_second: f64,
    entry_zscore: f64,
    exit_zscore: f64,
    hedge_ratio: f64,
    realized_return: f64,
    holding_periods: usize,
    /// Closed by the end of the window rather than an exit signal.
    forced: bool,
}

impl Trade {
    pub(crate) fn seal(open: OpenPosition, exit_index: usize, exit: &SpreadPoint, hedge_ratio: f64, forced: bool) -> Self {
        Self {
            direction: open.direction,
            entry_date: open.entry_date,
            exit_date: exit.date,
            entry_first: open.entry_first,
            entry_second: open.entry_second,
            exit_first: exit.price_first,
            exit_second: exit.price_second,
            entry_zscore: open.entry_zscore,
            exit_zscore: exit.zscore,
            hedge_ratio,
            realized_return: open.return_at(hedge_ratio, exit.price_first, exit.price_second),
            holding_periods: exit_index - open.entry_index,
            forced,
        }
    }

    pub fn direction(&self) -> PositionState {
        self.direction
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn exit_date(&self) -> NaiveDate {
        self.exit_date
    }

    pub fn entry_prices(&self) -> (f64, f64) {
        (self.entry_first, self.entry_second)
    }

    pub fn exit_prices(&self) -> (f64, f64) {
        (self.exit_first, self.exit_second)
    }

    /// first / second at entry.
    pub fn entry_ratio(&self) -> f64 {
        self.entry_first / self.entry_second
    }

    pub fn exit_ratio(&self) -> f64 {
        self.exit_first / self.exit_second
    }

    pub fn entry_zscore(&self) -> f64 {
        self.entry_zscore
    }

    pub fn exit_zscore(&self) -> f64 {
        self.exit_zscore
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.hedge_ratio
    }

    pub fn realized_return(&self) -> f64 {
        self.realized_return
    }

    pub fn holding_periods(&self) -> usize {
        self.holding_periods
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn is_win(&self) -> bool {
        self.realized_return > 0.0
    }
}

/// A point on the equity curve. Equity starts at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    /// State held at the close of this date, after any transition.
    pub state: PositionState,
}

/// Raw simulator output: the trade log and the marked-to-market curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRun {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// final / initial - 1.
    pub total_return: f64,
    /// Annualised from daily equity returns; 0 with no trades or no variance.
    pub sharpe_ratio: f64,
    /// Non-positive fraction, e.g. -0.12.
    pub max_drawdown: f64,
    /// Winning trades / trades; 0 with no trades.
    pub win_rate: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub forced_exits: usize,
    pub avg_trade_return: f64,
    pub avg_holding_periods: f64,
    /// Fraction of dates with an open position.
    pub exposure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub pair: PairKey,
    pub hedge_ratio: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
}
