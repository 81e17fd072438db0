pub mod engine;
pub mod metrics;
pub mod models;

pub use engine::{BacktestSimulator, INITIAL_EQUITY};
pub use metrics::{sharpe, PerformanceEvaluator, TRADING_DAYS_PER_YEAR};
pub use models::*;
