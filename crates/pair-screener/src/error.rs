use pair_core::PairError;
use thiserror::Error;

/// Failures that stop a whole screening run.
///
/// Per-pair problems never surface here; they are reported as excluded pairs.
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error(transparent)]
    Config(#[from] PairError),

    #[error("Universe source failed: {0}")]
    Universe(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
