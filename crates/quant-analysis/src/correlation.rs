use std::collections::BTreeMap;

use pair_core::{stats, PairCandidate, PairError, PairKey, PriceSeries};
use rayon::prelude::*;

use crate::alignment::{AlignedPair, SeriesAligner};

/// A candidate together with the aligned prices it was measured on, so the
/// cointegration stage does not re-align.
#[derive(Debug, Clone)]
pub struct ScreenedPair {
    pub candidate: PairCandidate,
    pub aligned: AlignedPair,
}

/// Outcome of the O(n^2) correlation pre-filter.
#[derive(Debug, Clone, Default)]
pub struct CorrelationScreen {
    /// Pairs whose absolute correlation is at or above the threshold, in symbol order.
    pub candidates: Vec<ScreenedPair>,
    /// Unordered pairs actually evaluated, `n * (n - 1) / 2` over eligible symbols.
    pub pairs_enumerated: usize,
    /// Symbols dropped before enumeration because their own history is too short.
    pub short_symbols: Vec<String>,
    /// Pairs dropped for insufficient overlap or undefined correlation.
    pub excluded: Vec<(PairKey, PairError)>,
    pub below_threshold: usize,
}

enum PairOutcome {
    Candidate(Box<ScreenedPair>),
    Below,
    Excluded(PairKey, PairError),
}

/// Number of unordered pairs over `n` symbols.
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

pub struct CorrelationFilter {
    threshold: f64,
    min_observations: usize,
}

impl CorrelationFilter {
    pub fn new(threshold: f64, min_observations: usize) -> Self {
        Self {
            threshold,
            min_observations,
        }
    }

    /// Correlation of aligned log returns for one pair.
    ///
    /// Short-circuits on the date-range overlap before aligning anything.
    pub fn pair_correlation(&self, a: &PriceSeries, b: &PriceSeries) -> Result<(f64, AlignedPair), PairError> {
        let bound = SeriesAligner::overlap_upper_bound(a, b);
        if bound < self.min_observations {
            return Err(PairError::InsufficientHistory {
                required: self.min_observations,
                actual: bound,
            });
        }

        let aligned = SeriesAligner::align_pair(a, b);
        if aligned.len() < self.min_observations {
            return Err(PairError::InsufficientHistory {
                required: self.min_observations,
                actual: aligned.len(),
            });
        }

        let ra = stats::log_returns(&aligned.first);
        let rb = stats::log_returns(&aligned.second);
        let correlation = stats::pearson(&ra, &rb)
            .ok_or_else(|| PairError::NoSignal(format!("{}: zero-variance returns", aligned.pair)))?;
        Ok((correlation, aligned))
    }

    /// Enumerate every unordered pair of `universe` and keep those whose
    /// |correlation| reaches the threshold. Anti-correlated pairs are kept with
    /// their sign. Deterministic: output follows symbol order.
    pub fn screen(&self, universe: &BTreeMap<String, PriceSeries>) -> CorrelationScreen {
        let (eligible, short): (Vec<&PriceSeries>, Vec<&PriceSeries>) = universe
            .values()
            .partition(|s| s.len() >= self.min_observations);
        let short_symbols: Vec<String> = short.iter().map(|s| s.symbol().to_string()).collect();

        let n = eligible.len();
        let outcomes: Vec<PairOutcome> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| self.evaluate(eligible[i], eligible[j]))
            .collect();

        let mut screen = CorrelationScreen {
            pairs_enumerated: outcomes.len(),
            short_symbols,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                PairOutcome::Candidate(pair) => screen.candidates.push(*pair),
                PairOutcome::Below => screen.below_threshold += 1,
                PairOutcome::Excluded(pair, err) => {
                    tracing::debug!("{} excluded from correlation screen: {}", pair, err);
                    screen.excluded.push((pair, err));
                }
            }
        }

        tracing::info!(
            "Correlation screen: {} symbols ({} too short), {} pairs, {} candidates |r| >= {:.2}, {} excluded",
            universe.len(),
            screen.short_symbols.len(),
            screen.pairs_enumerated,
            screen.candidates.len(),
            self.threshold,
            screen.excluded.len()
        );
        screen
    }

    fn evaluate(&self, a: &PriceSeries, b: &PriceSeries) -> PairOutcome {
        match self.pair_correlation(a, b) {
            Ok((correlation, aligned)) if correlation.abs() >= self.threshold => {
                let (Some(start), Some(end)) = (aligned.start(), aligned.end()) else {
                    return PairOutcome::Below;
                };
                match PairCandidate::new(aligned.pair.clone(), correlation, start, end, aligned.len()) {
                    Ok(candidate) => PairOutcome::Candidate(Box::new(ScreenedPair { candidate, aligned })),
                    Err(e) => PairOutcome::Excluded(aligned.pair, e),
                }
            }
            Ok(_) => PairOutcome::Below,
            Err(e) => PairOutcome::Excluded(PairKey::new(a.symbol(), b.symbol()), e),
        }
    }
}
