use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pair_core::{CointegrationMethod, Horizon, ScreeningConfig, ZScoreMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    EngleGranger,
    Johansen,
    /// Both tests; a pair passes when either does
    Combined,
}

impl From<MethodArg> for CointegrationMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::EngleGranger => CointegrationMethod::EngleGranger,
            MethodArg::Johansen => CointegrationMethod::Johansen,
            MethodArg::Combined => CointegrationMethod::Combined,
        }
    }
}

/// Screen a universe of end-of-day prices for cointegrated pairs and
/// rank them by a backtested mean-reversion score.
#[derive(Debug, Parser)]
#[command(name = "pair-scan", version)]
pub struct Cli {
    /// Long-format price file with `date,symbol,close` columns
    #[arg(long, env = "PAIR_SCAN_PRICES")]
    pub prices: PathBuf,

    /// `symbol,name` file in priority order; defaults to every symbol in the price file
    #[arg(long, env = "PAIR_SCAN_SYMBOLS")]
    pub symbols: Option<PathBuf>,

    /// JSON screening config; flags below override its fields
    #[arg(long, env = "PAIR_SCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the full JSON report here
    #[arg(long, env = "PAIR_SCAN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Maximum number of symbols, taken in priority order
    #[arg(long, env = "PAIR_SCAN_STOCKS")]
    pub stocks: Option<usize>,

    /// Maximum pairs backtested per horizon
    #[arg(long, env = "PAIR_SCAN_PAIRS")]
    pub pairs: Option<usize>,

    /// Minimum return correlation
    #[arg(long, env = "PAIR_SCAN_CORRELATION")]
    pub correlation: Option<f64>,

    /// Maximum cointegration p-value
    #[arg(long, env = "PAIR_SCAN_PVALUE")]
    pub pvalue: Option<f64>,

    #[arg(long, env = "PAIR_SCAN_ENTRY_Z", allow_hyphen_values = true)]
    pub entry_z: Option<f64>,

    #[arg(long, env = "PAIR_SCAN_EXIT_Z", allow_hyphen_values = true)]
    pub exit_z: Option<f64>,

    #[arg(long, value_enum, env = "PAIR_SCAN_METHOD")]
    pub method: Option<MethodArg>,

    /// Horizons in months, e.g. `--horizons 6,12,24`
    #[arg(long, value_delimiter = ',', env = "PAIR_SCAN_HORIZONS")]
    pub horizons: Option<Vec<u32>>,

    /// Fixed rolling z-score window in observations; by default the window is
    /// min(60, observations / 4) per horizon
    #[arg(long, env = "PAIR_SCAN_ZSCORE_WINDOW", conflicts_with = "static_zscore")]
    pub zscore_window: Option<usize>,

    /// Normalise the spread over the whole window instead of a rolling one
    #[arg(long)]
    pub static_zscore: bool,

    /// Drop pairs whose half-life exceeds this many days
    #[arg(long, env = "PAIR_SCAN_MAX_HALF_LIFE")]
    pub max_half_life: Option<f64>,

    /// Drop pairs that show no mean reversion
    #[arg(long)]
    pub require_mean_reversion: bool,

    /// Worker threads; defaults to one per core
    #[arg(long, env = "PAIR_SCAN_WORKERS")]
    pub workers: Option<usize>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,

    /// Skip the console tables
    #[arg(long)]
    pub no_table: bool,
}

impl Cli {
    /// Config file (or defaults) with every given flag applied on top.
    /// Validation happens when the aggregator is built.
    pub fn screening_config(&self) -> Result<ScreeningConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => ScreeningConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut ScreeningConfig) {
        if let Some(v) = self.stocks {
            config.max_stocks = v;
        }
        if let Some(v) = self.pairs {
            config.max_pairs_per_period = v;
        }
        if let Some(v) = self.correlation {
            config.correlation_threshold = v;
        }
        if let Some(v) = self.pvalue {
            config.cointegration_pvalue = v;
        }
        if let Some(v) = self.entry_z {
            config.entry_z = v;
        }
        if let Some(v) = self.exit_z {
            config.exit_z = v;
        }
        if let Some(m) = self.method {
            config.method = m.into();
        }
        if let Some(months) = &self.horizons {
            config.horizons = months.iter().copied().map(Horizon::from_months).collect();
        }
        if self.static_zscore {
            config.zscore_mode = ZScoreMode::Static;
        } else if let Some(window) = self.zscore_window {
            config.zscore_mode = ZScoreMode::Rolling { window };
        }
        if self.max_half_life.is_some() {
            config.max_half_life = self.max_half_life;
        }
        if self.require_mean_reversion {
            config.require_mean_reversion = true;
        }
        if self.workers.is_some() {
            config.max_workers = self.workers;
        }
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "pair_scan=debug,pair_screener=debug,quant_analysis=debug,backtest_engine=debug"
        } else {
            "pair_scan=info,pair_screener=info,quant_analysis=warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pair-scan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = parse(&["--prices", "prices.csv"]);
        let config = cli.screening_config().unwrap();
        assert_eq!(config, ScreeningConfig::default());
        assert_eq!(config.method, CointegrationMethod::Combined);
        assert_eq!(config.zscore_mode, ZScoreMode::Adaptive { max_window: 60 });
        assert_eq!(cli.log_filter(), "pair_scan=info,pair_screener=info,quant_analysis=warn");
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--prices",
            "prices.csv",
            "--stocks",
            "50",
            "--pairs",
            "5",
            "--correlation",
            "0.9",
            "--entry-z",
            "2.5",
            "--exit-z",
            "0",
            "--method",
            "johansen",
            "--horizons",
            "3,12",
            "--static-zscore",
        ]);
        let config = cli.screening_config().unwrap();
        assert_eq!(config.max_stocks, 50);
        assert_eq!(config.max_pairs_per_period, 5);
        assert_eq!(config.correlation_threshold, 0.9);
        assert_eq!(config.entry_z, 2.5);
        assert_eq!(config.exit_z, 0.0);
        assert_eq!(config.method, CointegrationMethod::Johansen);
        assert_eq!(config.horizons, vec![Horizon::from_months(3), Horizon::from_months(12)]);
        assert_eq!(config.zscore_mode, ZScoreMode::Static);
    }

    #[test]
    fn test_combined_method_flag() {
        let cli = parse(&["--prices", "p.csv", "--method", "engle-granger"]);
        assert_eq!(cli.screening_config().unwrap().method, CointegrationMethod::EngleGranger);
        let cli = parse(&["--prices", "p.csv", "--method", "combined"]);
        assert_eq!(cli.screening_config().unwrap().method, CointegrationMethod::Combined);
    }

    #[test]
    fn test_window_conflicts_with_static() {
        let result = Cli::try_parse_from(["pair-scan", "--prices", "p.csv", "--zscore-window", "30", "--static-zscore"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rolling_window_flag() {
        let cli = parse(&["--prices", "p.csv", "--zscore-window", "20"]);
        assert_eq!(cli.screening_config().unwrap().zscore_mode, ZScoreMode::Rolling { window: 20 });
    }
}
