//! CSV adapters for the screener's universe and price collaborators.
//!
//! Symbols file: `symbol,name` in priority order, `name` optional.
//! Prices file: long format `date,symbol,close`, one row per symbol and day.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use pair_core::{PairError, PriceSeries, PriceSource, UniverseEntry, UniverseSource};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row {row}: cannot parse date '{value}' (expected YYYY-MM-DD)")]
    Date { row: usize, value: String },

    #[error(transparent)]
    Series(#[from] PairError),
}

#[derive(Debug, Deserialize)]
struct SymbolRow {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    symbol: String,
    close: Option<f64>,
}

fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn parse_date(row: usize, raw: &str) -> Result<NaiveDate, SourceError> {
    let value = raw.trim();
    // Timestamps are accepted; only the calendar day matters.
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| SourceError::Date {
        row,
        value: value.to_string(),
    })
}

/// Ordered symbol list read from a `symbol,name` file.
#[derive(Debug, Clone, Default)]
pub struct CsvUniverse {
    entries: Vec<UniverseEntry>,
}

impl CsvUniverse {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for row in csv.deserialize::<SymbolRow>() {
            let row = row?;
            let symbol = normalize_symbol(&row.symbol);
            if symbol.is_empty() {
                continue;
            }
            entries.push(UniverseEntry {
                symbol,
                name: row.name.filter(|n| !n.trim().is_empty()),
            });
        }
        Ok(Self { entries })
    }
}

impl UniverseSource for CsvUniverse {
    type Error = SourceError;

    fn universe(&self) -> Result<Vec<UniverseEntry>, SourceError> {
        Ok(self.entries.clone())
    }
}

/// Closes for every symbol in a long-format price file, held in memory.
///
/// Also serves as a universe when no symbols file is given: symbols in order
/// of first appearance.
#[derive(Debug, Clone, Default)]
pub struct CsvPrices {
    order: Vec<String>,
    closes: HashMap<String, Vec<(NaiveDate, f64)>>,
}

impl CsvPrices {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut prices = Self::default();
        let mut skipped = 0usize;
        for (i, row) in csv.deserialize::<PriceRow>().enumerate() {
            let row = row?;
            let symbol = normalize_symbol(&row.symbol);
            let Some(close) = row.close else {
                skipped += 1;
                continue;
            };
            if symbol.is_empty() {
                skipped += 1;
                continue;
            }
            // Header is line 1.
            let date = parse_date(i + 2, &row.date)?;
            prices
                .closes
                .entry(symbol.clone())
                .or_insert_with(|| {
                    prices.order.push(symbol);
                    Vec::new()
                })
                .push((date, close));
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} price rows without a symbol or close", skipped);
        }
        Ok(prices)
    }

    pub fn symbols(&self) -> &[String] {
        &self.order
    }
}

impl PriceSource for CsvPrices {
    type Error = SourceError;

    fn price_series(&self, symbol: &str) -> Result<Option<PriceSeries>, SourceError> {
        match self.closes.get(&normalize_symbol(symbol)) {
            Some(obs) => Ok(Some(PriceSeries::from_unsorted(normalize_symbol(symbol), obs.clone())?)),
            None => Ok(None),
        }
    }
}

impl UniverseSource for CsvPrices {
    type Error = SourceError;

    fn universe(&self) -> Result<Vec<UniverseEntry>, SourceError> {
        Ok(self
            .order
            .iter()
            .map(|symbol| UniverseEntry {
                symbol: symbol.clone(),
                name: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PRICES: &str = "date,symbol,close\n\
        2024-01-03,ko,60.5\n\
        2024-01-02,KO,60.0\n\
        2024-01-02,PEP,170.0\n\
        2024-01-03,PEP,\n\
        2024-01-04 00:00:00,PEP,171.0\n";

    #[test]
    fn test_universe_keeps_file_order_and_optional_names() {
        let csv = "symbol,name\nPEP,PepsiCo\n ko ,\nXOM\n";
        let universe = CsvUniverse::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            universe.universe().unwrap(),
            vec![
                UniverseEntry {
                    symbol: "PEP".into(),
                    name: Some("PepsiCo".into())
                },
                UniverseEntry {
                    symbol: "KO".into(),
                    name: None
                },
                UniverseEntry {
                    symbol: "XOM".into(),
                    name: None
                },
            ]
        );
    }

    #[test]
    fn test_prices_are_grouped_and_sorted() {
        let prices = CsvPrices::from_reader(PRICES.as_bytes()).unwrap();
        assert_eq!(prices.symbols(), &["KO".to_string(), "PEP".to_string()]);

        let ko = prices.price_series("KO").unwrap().unwrap();
        assert_eq!(ko.closes(), vec![60.0, 60.5]);

        let pep = prices.price_series("pep").unwrap().unwrap();
        assert_eq!(pep.len(), 2);
        assert_eq!(pep.last_date(), NaiveDate::from_ymd_opt(2024, 1, 4));

        assert!(prices.price_series("XOM").unwrap().is_none());
    }

    #[test]
    fn test_bad_date_reports_row() {
        let csv = "date,symbol,close\n2024-01-02,KO,60.0\n01/03/2024,KO,61.0\n";
        match CsvPrices::from_reader(csv.as_bytes()) {
            Err(SourceError::Date { row, .. }) => assert_eq!(row, 3),
            other => panic!("expected date error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_series_surfaces_per_symbol() {
        let csv = "date,symbol,close\n2024-01-02,KO,60.0\n2024-01-02,KO,61.0\n";
        let prices = CsvPrices::from_reader(csv.as_bytes()).unwrap();
        assert!(matches!(prices.price_series("KO"), Err(SourceError::Series(_))));
    }
}
