//! Celebration, pause and daily-status endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use missa_core::{CommittedCelebration, DailyStatus, Intention, IntentionId, IntentionState};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::middleware::Holder;
use crate::state::AppState;

/// Request body for recording a celebration.
#[derive(Debug, Deserialize)]
pub struct CelebrateRequest {
    pub mass_intention_id: IntentionId,
    /// Defaults to today.
    pub celebration_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Record a celebration against an intention.
/// POST /api/celebrate-mass
pub async fn celebrate_mass(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Json(request): Json<CelebrateRequest>,
) -> ApiResult<(StatusCode, Json<CommittedCelebration>)> {
    let date = request
        .celebration_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let id = request.mass_intention_id;

    let committed = state
        .with_engine(&holder, move |engine| {
            engine.celebrate(id, date, request.notes)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(committed)))
}

#[derive(Debug, Deserialize)]
pub struct TogglePauseRequest {
    pub bulk_mass_intention_id: IntentionId,
}

#[derive(Debug, Serialize)]
pub struct TogglePauseResponse {
    pub is_paused: bool,
    pub intention: Intention,
}

/// Pause or resume a Bulk intention.
/// POST /api/toggle-bulk-mass-pause
pub async fn toggle_bulk_mass_pause(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Json(request): Json<TogglePauseRequest>,
) -> ApiResult<Json<TogglePauseResponse>> {
    let id = request.bulk_mass_intention_id;
    let intention = state
        .with_engine(&holder, move |engine| engine.toggle_bulk_pause(id))
        .await?;

    let is_paused = matches!(intention.state, IntentionState::Bulk { is_paused: true, .. });
    Ok(Json(TogglePauseResponse {
        is_paused,
        intention,
    }))
}

/// Request body for the per-day celebration record.
#[derive(Debug, Deserialize)]
pub struct DailyStatusRequest {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub celebrated_mass: bool,
    pub reason_not_celebrated: Option<String>,
}

/// Record whether a mass was celebrated on a day.
/// POST /api/daily-status
pub async fn record_daily_status(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Json(request): Json<DailyStatusRequest>,
) -> ApiResult<Json<DailyStatus>> {
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

    let status = state
        .with_engine(&holder, move |engine| {
            engine.record_daily_status(
                date,
                request.celebrated_mass,
                request.reason_not_celebrated,
            )
        })
        .await?;
    Ok(Json(status))
}
