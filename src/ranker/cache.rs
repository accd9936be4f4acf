//! Compiled ranker cache
//!
//! Holds at most one compiled artifact per `(store, model)`. An entry is only
//! served for the exact version it was compiled from, and caching any other
//! version replaces it. There is no time- or size-based eviction.

use super::CompiledRanker;
use crate::metrics;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RankerCache {
    entries: DashMap<(String, String), Arc<CompiledRanker>>,
}

impl RankerCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the artifact compiled from exactly `version`
    pub fn get(&self, store: &str, name: &str, version: u64) -> Option<Arc<CompiledRanker>> {
        let hit = self
            .entries
            .get(&(store.to_string(), name.to_string()))
            .filter(|entry| entry.version() == version)
            .map(|entry| Arc::clone(entry.value()));
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Cache an artifact, replacing any artifact of another version.
    pub fn insert(&self, ranker: Arc<CompiledRanker>) {
        let key = (ranker.store().to_string(), ranker.name().to_string());
        self.entries.insert(key, ranker);
    }

    pub fn invalidate(&self, store: &str, name: &str) {
        self.entries.remove(&(store.to_string(), name.to_string()));
    }

    /// Drop every artifact compiled from `store`
    pub fn invalidate_store(&self, store: &str) {
        self.entries.retain(|(s, _), _| s != store);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
