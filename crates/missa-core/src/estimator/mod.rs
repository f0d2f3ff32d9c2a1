//! Bulk schedule estimation.
//!
//! Projections are derived from the remaining count, the pause flag and the
//! observed celebration pace. They are cached by intention version and never
//! written back to the store.

mod cache;

pub use cache::EstimateCache;

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::debug;

use crate::error::{MissaError, MissaResult};
use crate::store::IntentionStore;
use crate::types::{Intention, IntentionId, IntentionState};

/// Average days between consecutive celebrations.
///
/// Falls back to `default_pace_days` when fewer than two celebrations are
/// known.
pub fn average_interval(history: &[NaiveDate], default_pace_days: f64) -> f64 {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() >= 2 => {
            (*last - *first).num_days() as f64 / (history.len() - 1) as f64
        }
        _ => default_pace_days,
    }
}

/// Projected completion date of an intention.
///
/// Only Bulk intentions have a projection. A paused intention has none, and
/// an exhausted one reports the date of its last celebration.
pub fn project(state: &IntentionState, default_pace_days: f64) -> Option<NaiveDate> {
    match state {
        IntentionState::Bulk {
            remaining_masses,
            is_paused,
            start_date,
            celebration_history,
            ..
        } => {
            if *is_paused {
                return None;
            }
            if *remaining_masses == 0 {
                return celebration_history.last().copied();
            }
            let interval = average_interval(celebration_history, default_pace_days);
            let base = celebration_history.last().copied().unwrap_or(*start_date);
            let days = (*remaining_masses as f64 * interval).round() as i64;
            Duration::try_days(days).and_then(|offset| base.checked_add_signed(offset))
        }
        IntentionState::Personal
        | IntentionState::FixedDate { .. }
        | IntentionState::Special { .. } => None,
    }
}

/// Estimator for Bulk completion dates.
pub struct BulkScheduleEstimator {
    default_pace_days: f64,
    cache: Arc<EstimateCache>,
}

impl BulkScheduleEstimator {
    pub fn new(default_pace_days: f64) -> Self {
        Self::with_cache(default_pace_days, Arc::new(EstimateCache::new()))
    }

    /// Create an estimator over a cache shared with the recorder.
    pub fn with_cache(default_pace_days: f64, cache: Arc<EstimateCache>) -> Self {
        Self {
            default_pace_days,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<EstimateCache> {
        &self.cache
    }

    /// Estimate the completion date of a Bulk intention.
    pub fn estimate<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        id: IntentionId,
    ) -> MissaResult<Option<NaiveDate>> {
        let intention = store
            .get(id)?
            .ok_or_else(|| MissaError::not_found(id.to_string()))?;

        if !matches!(intention.state, IntentionState::Bulk { .. }) {
            return Err(MissaError::validation(format!(
                "estimates are only available for bulk intentions, '{}' is {}",
                intention.title,
                intention.kind()
            )));
        }

        Ok(self.estimate_for(&intention))
    }

    /// Estimate for an already loaded intention, using the cache when its
    /// version still matches.
    pub fn estimate_for(&self, intention: &Intention) -> Option<NaiveDate> {
        if let Some(hit) = self.cache.get(intention.id, intention.version) {
            debug!(intention_id = %intention.id, version = intention.version, "Estimate cache hit");
            return hit;
        }

        let estimate = project(&intention.state, self.default_pace_days);
        self.cache.put(intention.id, intention.version, estimate);
        estimate
    }

    pub fn invalidate(&self, id: IntentionId) {
        self.cache.invalidate(id);
    }
}
