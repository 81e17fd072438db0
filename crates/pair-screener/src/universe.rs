use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use pair_core::{PriceSeries, PriceSource, UniverseEntry, UniverseSource};

use crate::error::{Result, ScreenerError};

/// Symbols in source priority order with their full price history.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    entries: Vec<UniverseEntry>,
    series: BTreeMap<String, PriceSeries>,
    /// Symbols the price source had nothing (or an error) for.
    missing: Vec<String>,
}

impl Universe {
    /// Load at most `max_stocks` symbols, in source order, and their prices.
    ///
    /// The cap is applied to the symbol list before any price is fetched.
    /// A symbol the price source fails on is recorded as missing, not fatal.
    pub fn load<U, P>(universe: &U, prices: &P, max_stocks: usize) -> Result<Self>
    where
        U: UniverseSource,
        P: PriceSource,
    {
        let entries = universe
            .universe()
            .map_err(|e| ScreenerError::Universe(e.to_string()))?;
        let entries = dedup(entries, max_stocks);

        let mut series = BTreeMap::new();
        let mut missing = Vec::new();
        for entry in &entries {
            match prices.price_series(&entry.symbol) {
                Ok(Some(s)) if !s.is_empty() => {
                    series.insert(entry.symbol.clone(), s);
                }
                Ok(_) => missing.push(entry.symbol.clone()),
                Err(e) => {
                    tracing::warn!("Price source failed for {}: {}", entry.symbol, e);
                    missing.push(entry.symbol.clone());
                }
            }
        }

        tracing::info!(
            "Universe loaded: {} symbols with prices, {} missing",
            series.len(),
            missing.len()
        );
        Ok(Self { entries, series, missing })
    }

    /// Build directly from in-memory series; their order is the priority order.
    pub fn from_series(series: Vec<PriceSeries>) -> Self {
        let mut universe = Self::default();
        for s in series {
            if universe.series.contains_key(s.symbol()) {
                continue;
            }
            universe.entries.push(UniverseEntry {
                symbol: s.symbol().to_string(),
                name: None,
            });
            universe.series.insert(s.symbol().to_string(), s);
        }
        universe
    }

    /// The first `max_stocks` symbols that have prices.
    pub fn capped(&self, max_stocks: usize) -> Universe {
        let entries: Vec<UniverseEntry> = self
            .entries
            .iter()
            .filter(|e| self.series.contains_key(&e.symbol))
            .take(max_stocks)
            .cloned()
            .collect();
        let series = entries
            .iter()
            .filter_map(|e| self.series.get(&e.symbol).map(|s| (e.symbol.clone(), s.clone())))
            .collect();
        Universe {
            entries,
            series,
            missing: self.missing.clone(),
        }
    }

    pub fn entries(&self) -> &[UniverseEntry] {
        &self.entries
    }

    pub fn series(&self) -> &BTreeMap<String, PriceSeries> {
        &self.series
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn name_of(&self, symbol: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .and_then(|e| e.name.as_deref())
    }

    /// Latest date across all series; horizons are measured back from here.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(|s| s.last_date()).max()
    }

    /// Every series restricted to dates on or after `start`.
    pub fn window(&self, start: NaiveDate) -> BTreeMap<String, PriceSeries> {
        self.series
            .iter()
            .map(|(symbol, s)| (symbol.clone(), s.since(start)))
            .collect()
    }
}

fn dedup(entries: Vec<UniverseEntry>, max_stocks: usize) -> Vec<UniverseEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.symbol.trim().is_empty() && seen.insert(e.symbol.clone()))
        .take(max_stocks)
        .collect()
}
