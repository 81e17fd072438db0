use pair_core::{PairError, ScreeningConfig, SpreadPoint, SpreadSeries};

use crate::models::*;

pub const INITIAL_EQUITY: f64 = 1.0;

/// Z-score mean-reversion simulator for one pair.
///
/// Steps through the spread in date order with at most one transition per
/// date: enter short at `z >= entry`, long at `z <= -entry`; leave a long at
/// `z >= -exit`, a short at `z <= exit`. Anything still open on the last date
/// is closed there and flagged as forced. No position is opened on the last
/// date, since it could not be held.
#[derive(Debug, Clone, Copy)]
pub struct BacktestSimulator {
    entry_z: f64,
    exit_z: f64,
}

impl BacktestSimulator {
    pub fn new(entry_z: f64, exit_z: f64) -> Result<Self, PairError> {
        if !entry_z.is_finite() || entry_z <= 0.0 {
            return Err(PairError::config("entry_z", format!("must be positive, got {}", entry_z)));
        }
        if !exit_z.is_finite() || exit_z < 0.0 || exit_z >= entry_z {
            return Err(PairError::config(
                "exit_z",
                format!("must be in [0, entry_z={}), got {}", entry_z, exit_z),
            ));
        }
        Ok(Self { entry_z, exit_z })
    }

    pub fn from_config(config: &ScreeningConfig) -> Result<Self, PairError> {
        Self::new(config.entry_z, config.exit_z)
    }

    pub fn entry_z(&self) -> f64 {
        self.entry_z
    }

    pub fn exit_z(&self) -> f64 {
        self.exit_z
    }

    /// Next state given the current one and today's z-score.
    pub fn transition(&self, state: PositionState, z: f64) -> PositionState {
        match state {
            PositionState::Flat if z >= self.entry_z => PositionState::ShortSpread,
            PositionState::Flat if z <= -self.entry_z => PositionState::LongSpread,
            PositionState::LongSpread if z >= -self.exit_z => PositionState::Flat,
            PositionState::ShortSpread if z <= self.exit_z => PositionState::Flat,
            other => other,
        }
    }

    pub fn run(&self, spread: &SpreadSeries) -> Result<SimulationRun, PairError> {
        let points = spread.points();
        if points.len() < 2 {
            return Err(PairError::InsufficientHistory {
                required: 2,
                actual: points.len(),
            });
        }
        let hedge_ratio = spread.hedge_ratio();
        let last = points.len() - 1;

        let mut realized = INITIAL_EQUITY;
        let mut open: Option<OpenPosition> = None;
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(points.len());

        for (i, point) in points.iter().enumerate() {
            let state = open.map_or(PositionState::Flat, |p| p.direction);
            let next = self.transition(state, point.zscore);

            match (open, next) {
                (None, PositionState::LongSpread | PositionState::ShortSpread) if i < last => {
                    open = Some(OpenPosition {
                        direction: next,
                        entry_index: i,
                        entry_date: point.date,
                        entry_first: point.price_first,
                        entry_second: point.price_second,
                        entry_zscore: point.zscore,
                    });
                }
                (Some(position), PositionState::Flat) => {
                    realized = close(&mut trades, position, i, point, hedge_ratio, false, realized);
                    open = None;
                }
                _ => {}
            }

            if i == last {
                if let Some(position) = open.take() {
                    realized = close(&mut trades, position, i, point, hedge_ratio, true, realized);
                }
            }

            let equity = match open {
                Some(position) => {
                    realized * (1.0 + position.return_at(hedge_ratio, point.price_first, point.price_second)).max(0.0)
                }
                None => realized,
            };
            equity_curve.push(EquityPoint {
                date: point.date,
                equity,
                state: open.map_or(PositionState::Flat, |p| p.direction),
            });
        }

        tracing::debug!(
            "{}: {} trades over {} dates, final equity {:.4}",
            spread.pair(),
            trades.len(),
            points.len(),
            realized
        );
        Ok(SimulationRun { trades, equity_curve })
    }
}

/// Seal a trade and compound its return into realized equity.
fn close(
    trades: &mut Vec<Trade>,
    position: OpenPosition,
    index: usize,
    point: &SpreadPoint,
    hedge_ratio: f64,
    forced: bool,
    realized: f64,
) -> f64 {
    let trade = Trade::seal(position, index, point, hedge_ratio, forced);
    let equity = realized * (1.0 + trade.realized_return()).max(0.0);
    trades.push(trade);
    equity
}
