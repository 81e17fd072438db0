//! pair-scan: screen a CSV price universe for cointegrated pairs.
//!
//! Usage:
//!   pair-scan --prices prices.csv
//!   pair-scan --prices prices.csv --symbols universe.csv --stocks 100 --output report.json
//!   pair-scan --prices prices.csv --method johansen --horizons 6,12 --static-zscore
//!   pair-scan --prices prices.csv --method engle-granger --zscore-window 40

mod cli;
mod output;
mod sources;

use anyhow::{Context, Result};
use clap::Parser;
use pair_screener::{PeriodAggregator, Universe};

use crate::cli::Cli;
use crate::sources::{CsvPrices, CsvUniverse};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()),
        )
        .init();

    let config = cli.screening_config()?;
    let aggregator = PeriodAggregator::new(config).context("Invalid screening configuration")?;

    let prices = CsvPrices::from_path(&cli.prices)
        .with_context(|| format!("Failed to load prices from {}", cli.prices.display()))?;
    tracing::info!("Loaded prices for {} symbols from {}", prices.symbols().len(), cli.prices.display());
    let max_stocks = aggregator.config().max_stocks;
    let universe = match &cli.symbols {
        Some(path) => {
            let symbols = CsvUniverse::from_path(path)
                .with_context(|| format!("Failed to load symbols from {}", path.display()))?;
            Universe::load(&symbols, &prices, max_stocks)?
        }
        None => Universe::load(&prices, &prices, max_stocks)?,
    };
    if universe.len() < 2 {
        anyhow::bail!("Need prices for at least two symbols, found {}", universe.len());
    }

    let report = aggregator.run(&universe);

    if let Some(path) = &cli.output {
        output::write_json(&report, path)?;
        tracing::info!("Report written to {}", path.display());
    }
    if !cli.no_table {
        output::print_report(&report);
    }
    Ok(())
}
