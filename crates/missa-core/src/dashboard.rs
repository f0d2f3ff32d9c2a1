//! Read-only dashboard projection.
//!
//! A snapshot combines today's status, Personal quota usage, running Bulk
//! intentions with their projections, upcoming and overdue Fixed-Date
//! intentions, and alerts. Nothing here is stored.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::MissaResult;
use crate::estimator::BulkScheduleEstimator;
use crate::store::{IntentionFilter, IntentionStore};
use crate::types::{
    DailyStatus, Intention, IntentionId, IntentionKind, IntentionSource, IntentionState,
    MonthRange, YearMonth,
};

/// Kind of dashboard alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Fixed-Date intention past its due date and not celebrated.
    FixedDateOverdue,
    /// Bulk intention exhausted and not yet acknowledged.
    BulkCompleted,
    /// Fewer Personal masses than the monthly limit so far this month.
    PersonalPending,
    BulkNearCompletion,
    FixedDateToday,
    FixedDateTomorrow,
}

/// A computed alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intention_id: Option<IntentionId>,
    pub message: String,
}

impl Alert {
    fn for_intention(kind: AlertKind, intention: &Intention, message: String) -> Self {
        Self {
            kind,
            intention_id: Some(intention.id),
            message,
        }
    }
}

/// Status of the snapshot day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStatus {
    pub date: NaiveDate,
    /// Personal celebrations dated today.
    pub personal_celebrations: u32,
    /// Whether any celebration is recorded for today.
    pub celebrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_status: Option<DailyStatus>,
}

/// Personal quota usage for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPersonal {
    pub month: YearMonth,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub id: IntentionId,
    pub title: String,
    pub source: IntentionSource,
    pub total_masses: u32,
    pub remaining_masses: u32,
    pub is_paused: bool,
    pub estimated_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedDateSummary {
    pub id: IntentionId,
    pub title: String,
    pub source: IntentionSource,
    pub original_date: NaiveDate,
    /// Rescheduled date if any, otherwise the original date.
    pub due_date: NaiveDate,
    pub is_celebrated: bool,
    pub overdue: bool,
}

/// Point-in-time dashboard for one holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub as_of: NaiveDate,
    pub today: TodayStatus,
    pub personal_this_month: MonthlyPersonal,
    pub personal_by_month: Vec<MonthlyPersonal>,
    pub bulk: Vec<BulkSummary>,
    pub fixed_date: Vec<FixedDateSummary>,
    pub alerts: Vec<Alert>,
}

impl DashboardSnapshot {
    pub fn alerts_of(&self, kind: AlertKind) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(move |a| a.kind == kind)
    }
}

/// Builds dashboard snapshots.
pub struct DashboardAggregator {
    personal_monthly_limit: u32,
    near_completion_threshold: u32,
}

impl DashboardAggregator {
    pub fn new(personal_monthly_limit: u32, near_completion_threshold: u32) -> Self {
        Self {
            personal_monthly_limit,
            near_completion_threshold,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.personal_monthly_limit,
            config.near_completion_threshold,
        )
    }

    /// Snapshot as of a date. `range` defaults to the month of `as_of`.
    pub fn snapshot<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        estimator: &BulkScheduleEstimator,
        as_of: NaiveDate,
        range: Option<MonthRange>,
    ) -> MissaResult<DashboardSnapshot> {
        let intentions = store.list(&IntentionFilter::all())?;
        let kinds: HashMap<IntentionId, IntentionKind> =
            intentions.iter().map(|i| (i.id, i.kind())).collect();

        let todays_events = store.events_on(as_of)?;
        let today = TodayStatus {
            date: as_of,
            personal_celebrations: todays_events
                .iter()
                .filter(|e| kinds.get(&e.intention_id) == Some(&IntentionKind::Personal))
                .count() as u32,
            celebrated: !todays_events.is_empty(),
            daily_status: store.daily_status(as_of)?,
        };

        let this_month = YearMonth::of(as_of);
        let personal_this_month = self.monthly(store, this_month)?;
        let range = range.unwrap_or_else(|| MonthRange::single(this_month));
        let personal_by_month = range
            .months()
            .into_iter()
            .map(|month| self.monthly(store, month))
            .collect::<MissaResult<Vec<_>>>()?;

        let mut bulk = Vec::new();
        let mut fixed_date = Vec::new();
        let mut alerts = Vec::new();
        let tomorrow = as_of + Duration::days(1);

        for intention in &intentions {
            match &intention.state {
                IntentionState::Bulk {
                    total_masses,
                    remaining_masses,
                    is_paused,
                    completion_acknowledged,
                    ..
                } => {
                    if *remaining_masses == 0 {
                        if !completion_acknowledged {
                            alerts.push(Alert::for_intention(
                                AlertKind::BulkCompleted,
                                intention,
                                format!("'{}' has completed all {} masses", intention.title, total_masses),
                            ));
                        }
                        continue;
                    }
                    if *remaining_masses <= self.near_completion_threshold {
                        alerts.push(Alert::for_intention(
                            AlertKind::BulkNearCompletion,
                            intention,
                            format!("'{}' has {} masses remaining", intention.title, remaining_masses),
                        ));
                    }
                    bulk.push(BulkSummary {
                        id: intention.id,
                        title: intention.title.clone(),
                        source: intention.source,
                        total_masses: *total_masses,
                        remaining_masses: *remaining_masses,
                        is_paused: *is_paused,
                        estimated_end: estimator.estimate_for(intention),
                    });
                }
                IntentionState::FixedDate {
                    original_date,
                    is_celebrated,
                    ..
                } => {
                    let due = intention.due_date().unwrap_or(*original_date);
                    let overdue = due < as_of && !is_celebrated;
                    if due < as_of && *is_celebrated {
                        continue;
                    }
                    if overdue {
                        alerts.push(Alert::for_intention(
                            AlertKind::FixedDateOverdue,
                            intention,
                            format!("'{}' was due on {} and is not celebrated", intention.title, due),
                        ));
                    } else if !is_celebrated && due == as_of {
                        alerts.push(Alert::for_intention(
                            AlertKind::FixedDateToday,
                            intention,
                            format!("'{}' is due today", intention.title),
                        ));
                    } else if !is_celebrated && due == tomorrow {
                        alerts.push(Alert::for_intention(
                            AlertKind::FixedDateTomorrow,
                            intention,
                            format!("'{}' is due tomorrow", intention.title),
                        ));
                    }
                    fixed_date.push(FixedDateSummary {
                        id: intention.id,
                        title: intention.title.clone(),
                        source: intention.source,
                        original_date: *original_date,
                        due_date: due,
                        is_celebrated: *is_celebrated,
                        overdue,
                    });
                }
                IntentionState::Personal | IntentionState::Special { .. } => {}
            }
        }

        if personal_this_month.count < personal_this_month.limit {
            alerts.push(Alert {
                kind: AlertKind::PersonalPending,
                intention_id: None,
                message: format!(
                    "{} of {} personal masses celebrated in {}",
                    personal_this_month.count, personal_this_month.limit, this_month
                ),
            });
        }

        fixed_date.sort_by_key(|f| f.due_date);
        alerts.sort_by_key(|a| alert_rank(a.kind));

        debug!(
            %as_of,
            bulk = bulk.len(),
            fixed_date = fixed_date.len(),
            alerts = alerts.len(),
            "Built dashboard snapshot"
        );

        Ok(DashboardSnapshot {
            as_of,
            today,
            personal_this_month,
            personal_by_month,
            bulk,
            fixed_date,
            alerts,
        })
    }

    fn monthly<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        month: YearMonth,
    ) -> MissaResult<MonthlyPersonal> {
        let count = store.count_personal_in_month(month)?;
        Ok(MonthlyPersonal {
            month,
            count,
            limit: self.personal_monthly_limit,
            remaining: self.personal_monthly_limit.saturating_sub(count),
        })
    }
}

fn alert_rank(kind: AlertKind) -> u8 {
    match kind {
        AlertKind::FixedDateOverdue => 0,
        AlertKind::BulkCompleted => 1,
        AlertKind::FixedDateToday => 2,
        AlertKind::FixedDateTomorrow => 3,
        AlertKind::BulkNearCompletion => 4,
        AlertKind::PersonalPending => 5,
    }
}
