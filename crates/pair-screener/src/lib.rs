//! Multi-horizon pair screening.
//!
//! For each horizon, trailing back from the latest price date, the screener
//! keeps highly correlated pairs, tests them for cointegration, backtests a
//! z-score strategy on the spread and ranks the survivors by composite score.

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod universe;


pub use aggregator::PeriodAggregator;
pub use cache::{AnalysisCache, CacheKey, CacheStats};
pub use error::{Result, ScreenerError};
pub use pipeline::{PairEvaluation, PairPipeline};
pub use report::*;
pub use scorer::{PairScorer, PeriodScore, ScoreComponents};
pub use universe::Universe;
