use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{CointegrationMethod, Horizon, PairError, ZScoreMode};

/// Parameters for one screening run.
///
/// Validated once up front; an invalid configuration is the only error that
/// aborts a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Minimum Pearson correlation of aligned log returns (0-1).
    pub correlation_threshold: f64,
    /// Maximum cointegration p-value for a pair to count as cointegrated (0-1).
    pub cointegration_pvalue: f64,
    pub entry_z: f64,
    pub exit_z: f64,
    /// Cap on the universe size, applied before pair enumeration.
    pub max_stocks: usize,
    /// Cap on pairs backtested per horizon, taken in (p-value, -correlation) order.
    pub max_pairs_per_period: usize,
    pub horizons: Vec<Horizon>,
    /// Aligned observations a pair needs before any statistic is computed.
    pub min_observations: usize,
    pub zscore_mode: ZScoreMode,
    pub method: CointegrationMethod,
    /// Drop pairs whose half-life exceeds this many periods.
    pub max_half_life: Option<f64>,
    /// Drop pairs whose AR(1) fit shows no mean reversion.
    pub require_mean_reversion: bool,
    /// Dedicated worker pool size; `None` uses the global rayon pool.
    pub max_workers: Option<usize>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.8,
            cointegration_pvalue: 0.05,
            entry_z: 2.0,
            exit_z: 0.5,
            max_stocks: 200,
            max_pairs_per_period: 15,
            horizons: Horizon::defaults(),
            min_observations: 60,
            zscore_mode: ZScoreMode::default(),
            method: CointegrationMethod::default(),
            max_half_life: None,
            require_mean_reversion: false,
            max_workers: None,
        }
    }
}

impl ScreeningConfig {
    pub fn validate(&self) -> Result<(), PairError> {
        unit_interval("correlation_threshold", self.correlation_threshold)?;
        unit_interval("cointegration_pvalue", self.cointegration_pvalue)?;

        if !self.entry_z.is_finite() || self.entry_z <= 0.0 {
            return Err(PairError::config("entry_z", format!("must be positive, got {}", self.entry_z)));
        }
        if !self.exit_z.is_finite() || self.exit_z < 0.0 || self.exit_z >= self.entry_z {
            return Err(PairError::config(
                "exit_z",
                format!("must be in [0, entry_z={}), got {}", self.entry_z, self.exit_z),
            ));
        }
        if self.max_stocks < 2 {
            return Err(PairError::config("max_stocks", "at least two symbols are needed to form a pair"));
        }
        if self.max_pairs_per_period == 0 {
            return Err(PairError::config("max_pairs_per_period", "must be at least 1"));
        }
        if self.horizons.is_empty() {
            return Err(PairError::config("horizons", "at least one horizon is required"));
        }
        let mut seen = HashSet::new();
        for h in &self.horizons {
            if h.months == 0 {
                return Err(PairError::config("horizons", format!("horizon '{}' must be longer than zero", h.label)));
            }
            if !seen.insert(h.months) {
                return Err(PairError::config("horizons", format!("duplicate horizon of {} months", h.months)));
            }
        }
        if self.min_observations < 3 {
            return Err(PairError::config("min_observations", "must be at least 3"));
        }
        match self.zscore_mode {
            ZScoreMode::Rolling { window } if window < 2 => {
                return Err(PairError::config("zscore_mode.window", "rolling window must be at least 2"));
            }
            ZScoreMode::Adaptive { max_window } if max_window < 2 => {
                return Err(PairError::config("zscore_mode.max_window", "adaptive window must be at least 2"));
            }
            _ => {}
        }
        if let Some(hl) = self.max_half_life {
            if !hl.is_finite() || hl <= 0.0 {
                return Err(PairError::config("max_half_life", format!("must be positive, got {}", hl)));
            }
        }
        if self.max_workers == Some(0) {
            return Err(PairError::config("max_workers", "must be at least 1 when set"));
        }
        Ok(())
    }

    /// Stable digest of every parameter that changes a single pair's analysis.
    ///
    /// Universe caps, horizons and worker count are excluded: they decide which
    /// pairs run, not what a pair's result is.
    pub fn analysis_fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.correlation_threshold.to_bits().hash(&mut hasher);
        self.cointegration_pvalue.to_bits().hash(&mut hasher);
        self.entry_z.to_bits().hash(&mut hasher);
        self.exit_z.to_bits().hash(&mut hasher);
        self.min_observations.hash(&mut hasher);
        self.zscore_mode.hash(&mut hasher);
        self.method.hash(&mut hasher);
        self.max_half_life.map(f64::to_bits).hash(&mut hasher);
        self.require_mean_reversion.hash(&mut hasher);
        hasher.finish()
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), PairError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(PairError::config(field, format!("must be within [0, 1], got {}", value)));
    }
    Ok(())
}
