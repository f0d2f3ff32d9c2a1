//! Celebration recording.
//!
//! Validation is fail-fast in a fixed order: the intention must exist, then
//! the kind-specific precondition must hold (already fulfilled, exhausted,
//! paused, monthly quota). The event and its state effect are then committed
//! as one store transaction.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{MissaError, MissaResult};
use crate::estimator::EstimateCache;
use crate::store::{
    CelebrationCommit, CommittedCelebration, IntentionFilter, IntentionStore, Mutation,
    QuotaGuard,
};
use crate::types::{
    CelebrationEvent, EventOrigin, Intention, IntentionId, IntentionKind, IntentionState,
    YearMonth,
};

/// Options for a single recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOptions {
    pub origin: EventOrigin,
    /// Accept a Personal celebration past the monthly limit, flagging the event.
    pub relax_quota: bool,
    /// Bulk only: append the date to history without consuming a mass.
    pub append_only: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self::live()
    }
}

impl RecordOptions {
    pub fn live() -> Self {
        Self {
            origin: EventOrigin::Live,
            relax_quota: false,
            append_only: false,
        }
    }

    pub fn import(relax_quota: bool) -> Self {
        Self {
            origin: EventOrigin::Import,
            relax_quota,
            append_only: false,
        }
    }

    pub fn append_only(mut self) -> Self {
        self.append_only = true;
        self
    }
}

/// Records celebrations against a holder's intentions.
pub struct CelebrationRecorder {
    personal_monthly_limit: u32,
    pause_bulk_on_priority_celebration: bool,
    cache: Arc<EstimateCache>,
}

impl CelebrationRecorder {
    pub fn new(personal_monthly_limit: u32, cache: Arc<EstimateCache>) -> Self {
        Self {
            personal_monthly_limit,
            pause_bulk_on_priority_celebration: false,
            cache,
        }
    }

    pub fn from_config(config: &EngineConfig, cache: Arc<EstimateCache>) -> Self {
        Self::new(config.personal_monthly_limit, cache)
            .with_priority_pause(config.pause_bulk_on_priority_celebration)
    }

    /// Pause running Bulk intentions when a Personal or Fixed-Date mass is celebrated live.
    pub fn with_priority_pause(mut self, enabled: bool) -> Self {
        self.pause_bulk_on_priority_celebration = enabled;
        self
    }

    /// Record a live celebration.
    pub fn record<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        intention_id: IntentionId,
        celebration_date: NaiveDate,
        notes: Option<String>,
    ) -> MissaResult<CommittedCelebration> {
        self.record_with_options(
            store,
            intention_id,
            celebration_date,
            notes,
            RecordOptions::live(),
        )
    }

    /// Record a celebration with explicit origin and quota handling.
    pub fn record_with_options<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        intention_id: IntentionId,
        celebration_date: NaiveDate,
        notes: Option<String>,
        options: RecordOptions,
    ) -> MissaResult<CommittedCelebration> {
        let intention = store
            .get(intention_id)?
            .ok_or_else(|| MissaError::not_found(intention_id.to_string()))?;

        let (effect, quota) = self.check(store, &intention, celebration_date, options)?;

        let mut mutations = Vec::new();
        if let Some(mutation) = effect {
            mutations.push((intention_id, mutation));
        }
        if self.pauses_bulk_for(&intention, options) {
            mutations.extend(running_bulk_pauses(store)?);
        }

        let event = CelebrationEvent::new(intention_id, celebration_date, notes, options.origin);
        let committed = store.commit_celebration(CelebrationCommit {
            event,
            mutations,
            quota,
        })?;

        self.cache.invalidate(intention_id);
        for other in &committed.also_changed {
            self.cache.invalidate(other.id);
        }

        info!(
            intention_id = %intention_id,
            kind = %intention.kind(),
            date = %celebration_date,
            origin = %options.origin,
            quota_relaxed = committed.event.quota_relaxed,
            paused_bulk = committed.also_changed.len(),
            "Recorded celebration"
        );

        Ok(committed)
    }

    /// Kind-specific precondition and the mutation it implies.
    fn check<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        intention: &Intention,
        date: NaiveDate,
        options: RecordOptions,
    ) -> MissaResult<(Option<Mutation>, Option<QuotaGuard>)> {
        match &intention.state {
            IntentionState::FixedDate { is_celebrated, .. }
            | IntentionState::Special { is_celebrated, .. } => {
                if *is_celebrated {
                    return Err(MissaError::already_fulfilled(format!(
                        "'{}' has already been celebrated",
                        intention.title
                    )));
                }
                Ok((Some(Mutation::MarkCelebrated { celebrated_on: date }), None))
            }
            IntentionState::Bulk {
                remaining_masses,
                is_paused,
                ..
            } => {
                if options.append_only {
                    return Ok((Some(Mutation::AppendBulkHistory { celebrated_on: date }), None));
                }
                if *remaining_masses == 0 {
                    return Err(MissaError::exhausted(format!(
                        "'{}' has no remaining masses",
                        intention.title
                    )));
                }
                if *is_paused {
                    return Err(MissaError::paused(format!("'{}' is paused", intention.title)));
                }
                Ok((
                    Some(Mutation::DecrementBulk {
                        expected_remaining: *remaining_masses,
                        celebrated_on: date,
                    }),
                    None,
                ))
            }
            IntentionState::Personal => {
                let month = YearMonth::of(date);
                if !options.relax_quota {
                    let used = store.count_personal_in_month(month)?;
                    debug!(%month, used, limit = self.personal_monthly_limit, "Personal quota check");
                    if used >= self.personal_monthly_limit {
                        return Err(MissaError::quota_exceeded(used, self.personal_monthly_limit));
                    }
                }
                Ok((
                    None,
                    Some(QuotaGuard {
                        month,
                        limit: self.personal_monthly_limit,
                        relaxed: options.relax_quota,
                    }),
                ))
            }
        }
    }

    fn pauses_bulk_for(&self, intention: &Intention, options: RecordOptions) -> bool {
        self.pause_bulk_on_priority_celebration
            && options.origin == EventOrigin::Live
            && matches!(
                intention.kind(),
                IntentionKind::Personal | IntentionKind::FixedDate
            )
    }
}

fn running_bulk_pauses<S: IntentionStore + ?Sized>(
    store: &S,
) -> MissaResult<Vec<(IntentionId, Mutation)>> {
    let running = store.list(&IntentionFilter::active().kind(IntentionKind::Bulk))?;
    Ok(running
        .into_iter()
        .filter(|bulk| matches!(bulk.state, IntentionState::Bulk { is_paused: false, .. }))
        .map(|bulk| {
            (
                bulk.id,
                Mutation::TogglePause {
                    expected_paused: false,
                },
            )
        })
        .collect())
}
