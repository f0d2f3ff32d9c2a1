//! Dashboard endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use missa_core::{DashboardSnapshot, MissaError, MonthRange, YearMonth};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::middleware::Holder;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Defaults to today.
    pub as_of: Option<NaiveDate>,
    /// First month of the personal-count range, `YYYY-MM`.
    pub from: Option<String>,
    /// Last month of the range; defaults to `from`.
    pub to: Option<String>,
}

impl DashboardQuery {
    fn month_range(&self) -> Result<Option<MonthRange>, MissaError> {
        let from = self.from.as_deref().map(str::parse::<YearMonth>).transpose()?;
        let to = self.to.as_deref().map(str::parse::<YearMonth>).transpose()?;
        match (from, to) {
            (None, None) => Ok(None),
            (Some(from), None) => Ok(Some(MonthRange::single(from))),
            (None, Some(to)) => Ok(Some(MonthRange::single(to))),
            (Some(from), Some(to)) => MonthRange::new(from, to).map(Some),
        }
    }
}

/// Dashboard snapshot for the holder.
/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardSnapshot>> {
    let range = query.month_range()?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let snapshot = state
        .with_engine(&holder, move |engine| engine.dashboard(as_of, range))
        .await?;
    Ok(Json(snapshot))
}
