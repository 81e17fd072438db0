use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PairError {
    #[error("Insufficient history: need at least {required} aligned observations, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Regression degenerate: {0}")]
    RegressionDegenerate(String),

    #[error("No signal: {0}")]
    NoSignal(String),

    #[error("Invalid configuration: {field} ({reason})")]
    ConfigurationInvalid { field: String, reason: String },

    #[error("Invalid series: {0}")]
    InvalidSeries(String),
}

impl PairError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PairError::ConfigurationInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable reason reported alongside excluded pairs.
    pub fn code(&self) -> ReasonCode {
        match self {
            PairError::InsufficientHistory { .. } => ReasonCode::InsufficientHistory,
            PairError::RegressionDegenerate(_) => ReasonCode::RegressionDegenerate,
            PairError::NoSignal(_) => ReasonCode::NoSignal,
            PairError::ConfigurationInvalid { .. } => ReasonCode::ConfigurationInvalid,
            PairError::InvalidSeries(_) => ReasonCode::InvalidSeries,
        }
    }

    /// Only configuration problems abort a whole run; everything else drops one pair.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PairError::ConfigurationInvalid { .. })
    }
}

/// Why a pair did not make it into a horizon's scored table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InsufficientHistory,
    RegressionDegenerate,
    NoSignal,
    NotCointegrated,
    HalfLifeRejected,
    ConfigurationInvalid,
    InvalidSeries,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InsufficientHistory => "insufficient_history",
            ReasonCode::RegressionDegenerate => "regression_degenerate",
            ReasonCode::NoSignal => "no_signal",
            ReasonCode::NotCointegrated => "not_cointegrated",
            ReasonCode::HalfLifeRejected => "half_life_rejected",
            ReasonCode::ConfigurationInvalid => "configuration_invalid",
            ReasonCode::InvalidSeries => "invalid_series",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(PairError::config("entry_z", "must be positive").is_fatal());
        assert!(!PairError::InsufficientHistory { required: 60, actual: 10 }.is_fatal());
        assert!(!PairError::RegressionDegenerate("singular".into()).is_fatal());
        assert!(!PairError::NoSignal("flat spread".into()).is_fatal());
    }

    #[test]
    fn test_reason_codes_serialize_snake_case() {
        let err = PairError::InsufficientHistory { required: 60, actual: 12 };
        assert_eq!(err.code(), ReasonCode::InsufficientHistory);
        let json = serde_json::to_string(&err.code()).unwrap();
        assert_eq!(json, "\"insufficient_history\"");
        assert_eq!(ReasonCode::HalfLifeRejected.to_string(), "half_life_rejected");
    }
}
