use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use dashmap::DashMap;
use pair_core::{CointegrationResult, Horizon, PairError, PairKey};
use serde::Serialize;

use crate::pipeline::PairEvaluation;

/// Identifies one pair's analysis: which pair, over which window and prices,
/// under which parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub pair: PairKey,
    /// Whole horizon, label included; evaluations carry the label.
    pub horizon: Horizon,
    pub window_end: NaiveDate,
    /// `AlignedPair::digest` of the prices the pair was measured on.
    pub data: u64,
    pub fingerprint: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Memoised per-pair results, owned by the aggregator.
///
/// Failures are cached as well, so a rerun with identical parameters does no
/// statistical work at all. Entries are only valid for one parameter set:
/// `prepare` drops everything when the fingerprint changes.
#[derive(Default)]
pub struct AnalysisCache {
    fingerprint: Mutex<Option<u64>>,
    cointegration: DashMap<CacheKey, Arc<Result<CointegrationResult, PairError>>>,
    evaluations: DashMap<CacheKey, Arc<Result<PairEvaluation, PairError>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the cache to a parameter set. Returns true when entries from a
    /// different parameter set were discarded.
    pub fn prepare(&self, fingerprint: u64) -> bool {
        let mut current = self.fingerprint.lock().unwrap_or_else(|e| e.into_inner());
        let stale = matches!(*current, Some(previous) if previous != fingerprint);
        if stale {
            self.cointegration.clear();
            self.evaluations.clear();
            tracing::info!("Analysis parameters changed; cache invalidated");
        }
        *current = Some(fingerprint);
        stale
    }

    pub fn invalidate_all(&self) {
        self.cointegration.clear();
        self.evaluations.clear();
        *self.fingerprint.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn cointegration_or_insert_with<F>(&self, key: CacheKey, compute: F) -> Arc<Result<CointegrationResult, PairError>>
    where
        F: FnOnce() -> Result<CointegrationResult, PairError>,
    {
        self.get_or_compute(&self.cointegration, key, compute)
    }

    pub fn evaluation_or_insert_with<F>(&self, key: CacheKey, compute: F) -> Arc<Result<PairEvaluation, PairError>>
    where
        F: FnOnce() -> Result<PairEvaluation, PairError>,
    {
        self.get_or_compute(&self.evaluations, key, compute)
    }

    fn get_or_compute<V, F>(&self, map: &DashMap<CacheKey, Arc<V>>, key: CacheKey, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(entry) = map.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(entry.value());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        // Computed outside the shard lock; pairs are unique per horizon so no key races itself.
        let value = Arc::new(compute());
        Arc::clone(map.entry(key).or_insert(value).value())
    }

    pub fn len(&self) -> usize {
        self.cointegration.len() + self.evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
