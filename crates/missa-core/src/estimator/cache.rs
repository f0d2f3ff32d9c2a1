//! Version-keyed cache for Bulk projections.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::types::IntentionId;

#[derive(Debug, Clone, Copy)]
struct CachedEstimate {
    version: u64,
    estimate: Option<NaiveDate>,
}

/// Projections keyed by intention id and the version they were computed at.
///
/// An entry is only returned while the intention is still at that version,
/// so a missed invalidation can never surface a date computed from older
/// history.
#[derive(Debug, Default)]
pub struct EstimateCache {
    entries: RwLock<HashMap<IntentionId, CachedEstimate>>,
}

impl EstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached projection, if one was computed at exactly `version`.
    pub fn get(&self, id: IntentionId, version: u64) -> Option<Option<NaiveDate>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&id) {
            Some(cached) if cached.version == version => Some(cached.estimate),
            Some(cached) => {
                debug!(intention_id = %id, cached = cached.version, current = version, "Stale estimate ignored");
                None
            }
            None => None,
        }
    }

    pub fn put(&self, id: IntentionId, version: u64, estimate: Option<NaiveDate>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(id, CachedEstimate { version, estimate });
    }

    /// Drop the entry for an intention.
    pub fn invalidate(&self, id: IntentionId) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.remove(&id).is_some() {
            debug!(intention_id = %id, "Invalidated cached estimate");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_hit_requires_matching_version() {
        let cache = EstimateCache::new();
        let id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 4, 1);

        cache.put(id, 3, date);
        assert_eq!(cache.get(id, 3), Some(date));
        assert_eq!(cache.get(id, 4), None);
    }

    #[test]
    fn test_cached_none_is_a_hit() {
        let cache = EstimateCache::new();
        let id = Uuid::new_v4();
        cache.put(id, 1, None);
        assert_eq!(cache.get(id, 1), Some(None));
    }

    #[test]
    fn test_invalidate() {
        let cache = EstimateCache::new();
        let id = Uuid::new_v4();
        cache.put(id, 1, None);
        cache.invalidate(id);
        assert!(cache.is_empty());
        assert_eq!(cache.get(id, 1), None);
    }
}
