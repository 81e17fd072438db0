use crate::{PriceSeries, UniverseEntry};

/// Supplies the symbol universe in priority order (e.g. by market cap).
///
/// Implementations are I/O adapters that live outside the analytical core.
pub trait UniverseSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn universe(&self) -> Result<Vec<UniverseEntry>, Self::Error>;
}

/// Supplies full end-of-day history for a symbol before screening starts.
pub trait PriceSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `Ok(None)` when the source has no data for `symbol`.
    fn price_series(&self, symbol: &str) -> Result<Option<PriceSeries>, Self::Error>;
}
