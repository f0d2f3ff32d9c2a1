//! Holder-scoped engine.
//!
//! An `IntentionEngine` owns one holder's store together with the recorder,
//! estimator and dashboard configured for it. It is created when a holder is
//! provisioned and dropped when the holder is removed; nothing is shared
//! between holders.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::EngineConfig;
use crate::dashboard::{DashboardAggregator, DashboardSnapshot};
use crate::error::{MissaError, MissaResult};
use crate::estimator::{BulkScheduleEstimator, EstimateCache};
use crate::import::{HistoricalImporter, ImportReport, ImportRow, ParsedRows};
use crate::recorder::CelebrationRecorder;
use crate::store::{
    CommittedCelebration, IntentionFilter, IntentionStore, Mutation, SqliteIntentionStore,
};
use crate::types::{
    CelebrationEvent, DailyStatus, HolderId, Intention, IntentionId, IntentionState, MonthRange,
    NewIntention,
};

/// All operations for one holder.
pub struct IntentionEngine {
    holder: HolderId,
    config: EngineConfig,
    store: Box<dyn IntentionStore>,
    estimator: BulkScheduleEstimator,
    recorder: CelebrationRecorder,
    dashboard: DashboardAggregator,
}

impl IntentionEngine {
    /// Open (or provision) the holder's database under `config.data_dir`.
    pub fn open(config: EngineConfig, holder: HolderId) -> MissaResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let path = Self::database_path(&config, &holder);
        info!(holder = %holder, path = %path.display(), "Opening holder store");
        let store = SqliteIntentionStore::new(&path)?;
        Ok(Self::with_store(config, holder, Box::new(store)))
    }

    /// Engine over an in-memory store (for testing)
    pub fn in_memory(config: EngineConfig, holder: HolderId) -> MissaResult<Self> {
        config.validate()?;
        let store = SqliteIntentionStore::in_memory()?;
        Ok(Self::with_store(config, holder, Box::new(store)))
    }

    pub fn with_store(config: EngineConfig, holder: HolderId, store: Box<dyn IntentionStore>) -> Self {
        let cache = Arc::new(EstimateCache::new());
        Self {
            estimator: BulkScheduleEstimator::with_cache(config.default_pace_days, cache.clone()),
            recorder: CelebrationRecorder::from_config(&config, cache),
            dashboard: DashboardAggregator::from_config(&config),
            holder,
            config,
            store,
        }
    }

    /// Database file for a holder.
    pub fn database_path(config: &EngineConfig, holder: &HolderId) -> PathBuf {
        config.data_dir.join(format!("{}.db", holder.as_str()))
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn IntentionStore {
        self.store.as_ref()
    }

    /// Dashboard snapshot as of a date.
    pub fn dashboard(
        &self,
        as_of: NaiveDate,
        range: Option<MonthRange>,
    ) -> MissaResult<DashboardSnapshot> {
        self.dashboard
            .snapshot(self.store(), &self.estimator, as_of, range)
    }

    /// Record a live celebration, returning the event with the state it
    /// produced.
    pub fn celebrate(
        &self,
        id: IntentionId,
        date: NaiveDate,
        notes: Option<String>,
    ) -> MissaResult<CommittedCelebration> {
        self.recorder.record(self.store(), id, date, notes)
    }

    /// Pause a running Bulk intention or resume a paused one.
    pub fn toggle_bulk_pause(&self, id: IntentionId) -> MissaResult<Intention> {
        let intention = self.get_intention(id)?;
        let expected_paused = match intention.state {
            IntentionState::Bulk { is_paused, .. } => is_paused,
            _ => {
                return Err(MissaError::validation(format!(
                    "'{}' is not a bulk intention",
                    intention.title
                )))
            }
        };

        let updated = self
            .store
            .apply_mutation(id, Mutation::TogglePause { expected_paused })?;
        self.estimator.invalidate(id);
        info!(intention_id = %id, paused = !expected_paused, "Toggled bulk pause");
        Ok(updated)
    }

    /// Intentions that can still be celebrated.
    pub fn active_intentions(&self) -> MissaResult<Vec<Intention>> {
        self.store.list(&IntentionFilter::active())
    }

    /// Import spreadsheet rows dated within `[start_year, end_year]`.
    pub fn import(
        &self,
        rows: &[ImportRow],
        start_year: i32,
        end_year: i32,
    ) -> MissaResult<ImportReport> {
        HistoricalImporter::new(&self.recorder, self.config.import_quota_policy).import(
            self.store(),
            rows,
            start_year,
            end_year,
        )
    }

    /// Import rows read from JSON Lines, reporting malformed lines too.
    pub fn import_parsed(
        &self,
        parsed: ParsedRows,
        start_year: i32,
        end_year: i32,
    ) -> MissaResult<ImportReport> {
        let rows = parsed.rows.iter().map(|(line, row)| (*line, row));
        let mut report = HistoricalImporter::new(&self.recorder, self.config.import_quota_policy)
            .import_numbered(self.store(), rows, start_year, end_year)?;
        report.absorb_malformed(parsed.malformed);
        Ok(report)
    }

    pub fn create_intention(&self, new: NewIntention) -> MissaResult<Intention> {
        let intention = self.store.create(new)?;
        info!(intention_id = %intention.id, kind = %intention.kind(), "Created intention");
        Ok(intention)
    }

    pub fn get_intention(&self, id: IntentionId) -> MissaResult<Intention> {
        self.store
            .get(id)?
            .ok_or_else(|| MissaError::not_found(id.to_string()))
    }

    pub fn list_intentions(&self, filter: &IntentionFilter) -> MissaResult<Vec<Intention>> {
        self.store.list(filter)
    }

    /// Projected completion date of a Bulk intention.
    pub fn estimate(&self, id: IntentionId) -> MissaResult<Option<NaiveDate>> {
        self.estimator.estimate(self.store(), id)
    }

    /// Silence the completion alert of an exhausted Bulk intention.
    pub fn acknowledge_completion(&self, id: IntentionId) -> MissaResult<Intention> {
        let intention = self.get_intention(id)?;
        match intention.state {
            IntentionState::Bulk {
                remaining_masses, ..
            } if remaining_masses > 0 => {
                return Err(MissaError::validation(format!(
                    "'{}' still has {} masses remaining",
                    intention.title, remaining_masses
                )))
            }
            IntentionState::Bulk { .. } => {}
            _ => {
                return Err(MissaError::validation(format!(
                    "'{}' is not a bulk intention",
                    intention.title
                )))
            }
        }
        self.store.apply_mutation(id, Mutation::AcknowledgeCompletion)
    }

    /// Move an uncelebrated Fixed-Date intention to another day.
    pub fn reschedule(
        &self,
        id: IntentionId,
        to: NaiveDate,
        reason: Option<String>,
    ) -> MissaResult<Intention> {
        let intention = self.get_intention(id)?;
        match intention.state {
            IntentionState::FixedDate {
                is_celebrated: true,
                ..
            } => {
                return Err(MissaError::already_fulfilled(format!(
                    "'{}' has already been celebrated",
                    intention.title
                )))
            }
            IntentionState::FixedDate { .. } => {}
            _ => {
                return Err(MissaError::validation(format!(
                    "'{}' is not a fixed-date intention",
                    intention.title
                )))
            }
        }
        let reason = reason.filter(|r| !r.trim().is_empty());
        let updated = self
            .store
            .apply_mutation(id, Mutation::Reschedule { to, reason })?;
        info!(intention_id = %id, to = %to, "Rescheduled intention");
        Ok(updated)
    }

    /// Celebration history of an intention.
    pub fn events_for(&self, id: IntentionId) -> MissaResult<Vec<CelebrationEvent>> {
        self.get_intention(id)?;
        self.store.events_for(id)
    }

    /// Record whether a mass was celebrated on a day. A reason is required
    /// when it was not.
    pub fn record_daily_status(
        &self,
        date: NaiveDate,
        celebrated: bool,
        reason: Option<String>,
    ) -> MissaResult<DailyStatus> {
        let status = if celebrated {
            DailyStatus::celebrated(date)
        } else {
            let reason = reason
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| MissaError::missing_field("reason_not_celebrated"))?;
            DailyStatus::not_celebrated(date, reason)
        };
        self.store.set_daily_status(&status)?;
        Ok(status)
    }

    pub fn daily_status(&self, date: NaiveDate) -> MissaResult<Option<DailyStatus>> {
        self.store.daily_status(date)
    }
}
