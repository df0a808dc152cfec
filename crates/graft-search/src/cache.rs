//! Evaluation cache keyed by diff fingerprint
//!
//! Variants with the same diff share one entry, whatever patch produced
//! them. Once the cache grows past `maxsize`, the least used entries are
//! dropped so that a `keep` fraction of `maxsize` survives, and every hit
//! counter is reset. The unmodified program (empty diff) and the entry
//! just stored are never evicted.

use graft_core::DiffFingerprint;
use graft_eval::RunResult;
use indexmap::IndexMap;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    run: RunResult,
    hits: u64,
}

/// Bounded diff-keyed cache of evaluation results
#[derive(Debug, Clone)]
pub struct EvalCache {
    entries: IndexMap<DiffFingerprint, Entry>,
    maxsize: usize,
    keep: f64,
    hits: u64,
    misses: u64,
}

impl EvalCache {
    /// `maxsize` 0 disables caching
    #[must_use]
    pub fn new(maxsize: usize, keep: f64) -> Self {
        Self {
            entries: IndexMap::new(),
            maxsize,
            keep,
            hits: 0,
            misses: 0,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.maxsize > 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &DiffFingerprint) -> bool {
        self.entries.contains_key(key)
    }

    /// Total lookups that found an entry
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Cached result, flagged as cached and not yet updated
    pub fn get(&mut self, key: &DiffFingerprint) -> Option<RunResult> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                entry.hits += 1;
                let mut run = entry.run.clone();
                run.cached = true;
                run.updated = false;
                Some(run)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting first if the cache is over capacity
    pub fn set(&mut self, key: DiffFingerprint, run: RunResult) {
        if !self.is_enabled() {
            return;
        }
        match self.entries.get_mut(&key) {
            Some(entry) => entry.run = run,
            None => {
                self.entries.insert(key, Entry { run, hits: 0 });
            }
        }
        if self.entries.len() > self.maxsize {
            self.evict(key);
        }
    }

    fn evict(&mut self, fresh: DiffFingerprint) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let drop = (self.maxsize as f64 * (1.0 - self.keep)) as usize;
        let mut candidates: Vec<(DiffFingerprint, u64)> = self
            .entries
            .iter()
            .filter(|(k, _)| **k != fresh && !k.is_empty_diff())
            .map(|(k, e)| (*k, e.hits))
            .collect();
        // stable: ties go to the oldest entry first
        candidates.sort_by_key(|(_, hits)| *hits);
        for (key, _) in candidates.into_iter().take(drop) {
            self.entries.shift_remove(&key);
        }
        for entry in self.entries.values_mut() {
            entry.hits = 0;
        }
        trace!(kept = self.entries.len(), "cache evicted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_eval::RunStatus;

    fn key(n: usize) -> DiffFingerprint {
        if n == 0 {
            DiffFingerprint::EMPTY
        } else {
            DiffFingerprint::of(&format!("--- a\n+++ b\n+{n}\n"))
        }
    }

    #[test]
    fn hits_and_misses() {
        let mut cache = EvalCache::new(10, 0.2);
        assert!(cache.get(&key(1)).is_none());
        let mut run = RunResult::new(RunStatus::SUCCESS);
        run.updated = true;
        cache.set(key(1), run);
        let got = cache.get(&key(1)).unwrap();
        assert!(got.cached);
        assert!(!got.updated);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn eviction_keeps_fraction_and_baseline() {
        let mut cache = EvalCache::new(10, 0.2);
        for n in 0..11 {
            cache.set(key(n), RunResult::new(RunStatus::SUCCESS));
        }
        // 11 > 10: drop 8 of the 9 evictable entries, keep 2 plus the baseline
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&DiffFingerprint::EMPTY));
        assert!(cache.contains(&key(10)));
    }

    #[test]
    fn frequently_used_entries_survive() {
        let mut cache = EvalCache::new(4, 0.5);
        for n in 1..=4 {
            cache.set(key(n), RunResult::default());
        }
        cache.get(&key(2));
        cache.get(&key(2));
        cache.get(&key(3));
        cache.set(key(5), RunResult::default());
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert!(cache.contains(&key(5)));
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let mut cache = EvalCache::new(0, 0.2);
        cache.set(key(1), RunResult::default());
        assert!(cache.is_empty());
    }
}
