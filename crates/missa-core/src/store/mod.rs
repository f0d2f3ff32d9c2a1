//! Intention storage trait and implementations.
//!
//! The store is scoped to a single holder. `apply_mutation` and
//! `commit_celebration` are the only paths that change intention state, and
//! both run the same conditional mutation routine.

mod mutation;
mod sqlite;

pub use mutation::Mutation;
pub use sqlite::SqliteIntentionStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MissaResult;
use crate::types::{
    CelebrationEvent, DailyStatus, Intention, IntentionId, IntentionKind, IntentionSource,
    NewIntention, YearMonth,
};

/// Query filter for listing intentions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<IntentionKind>,
    /// Only intentions that can still be celebrated (or only finished ones).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl IntentionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            kind: None,
            active: Some(true),
        }
    }

    pub fn kind(mut self, kind: IntentionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn only_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// Monthly Personal limit re-checked inside the commit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGuard {
    pub month: YearMonth,
    pub limit: u32,
    /// Accept the event anyway and flag it `quota_relaxed`.
    pub relaxed: bool,
}

/// Everything one celebration changes, applied as a unit.
#[derive(Debug, Clone)]
pub struct CelebrationCommit {
    pub event: CelebrationEvent,
    /// Mutations applied in order; the event's own intention usually comes first.
    pub mutations: Vec<(IntentionId, Mutation)>,
    pub quota: Option<QuotaGuard>,
}

/// Result of a committed celebration.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedCelebration {
    /// The stored event, including the final `quota_relaxed` flag.
    pub event: CelebrationEvent,
    /// The event's intention as it stands after the commit.
    pub intention: Intention,
    /// Other intentions changed in the same commit.
    pub also_changed: Vec<Intention>,
}

/// Trait for holder-scoped intention storage.
pub trait IntentionStore: Send + Sync {
    /// Create a new intention
    fn create(&self, new: NewIntention) -> MissaResult<Intention>;

    /// Get intention by ID
    fn get(&self, id: IntentionId) -> MissaResult<Option<Intention>>;

    /// Find an intention by its (title, kind, source) natural key
    fn find_by_natural_key(
        &self,
        title: &str,
        kind: IntentionKind,
        source: IntentionSource,
    ) -> MissaResult<Option<Intention>>;

    /// List intentions matching the filter, oldest first
    fn list(&self, filter: &IntentionFilter) -> MissaResult<Vec<Intention>>;

    /// Apply one conditional mutation
    fn apply_mutation(&self, id: IntentionId, mutation: Mutation) -> MissaResult<Intention>;

    /// Insert an event and apply its mutations atomically
    fn commit_celebration(&self, commit: CelebrationCommit) -> MissaResult<CommittedCelebration>;

    /// All events for an intention, by celebration date
    fn events_for(&self, id: IntentionId) -> MissaResult<Vec<CelebrationEvent>>;

    /// All events dated on a given day
    fn events_on(&self, date: NaiveDate) -> MissaResult<Vec<CelebrationEvent>>;

    /// Whether an event exists for the (intention, date) pair
    fn has_event_on(&self, id: IntentionId, date: NaiveDate) -> MissaResult<bool>;

    /// Number of Personal celebrations dated within the month
    fn count_personal_in_month(&self, month: YearMonth) -> MissaResult<u32>;

    /// Daily status for a date
    fn daily_status(&self, date: NaiveDate) -> MissaResult<Option<DailyStatus>>;

    /// Insert or replace the daily status for its date
    fn set_daily_status(&self, status: &DailyStatus) -> MissaResult<()>;
}
