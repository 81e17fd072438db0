pub mod adf;
pub mod alignment;
pub mod cointegration;
pub mod correlation;
pub mod johansen;
pub mod regression;
pub mod spread;

pub use adf::{adf_test, mackinnon_pvalue, AdfRegression, AdfResult, PValueSurface};
pub use alignment::{AlignedPair, AlignedPrices, SeriesAligner};
pub use cointegration::{half_life, CointegrationTester, MAX_HALF_LIFE};
pub use correlation::{pair_count, CorrelationFilter, CorrelationScreen, ScreenedPair};
pub use johansen::{johansen_test, JohansenResult};
pub use spread::{rolling_zscores, static_zscores, SpreadModel};
