//! Intention CRUD endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use missa_core::{
    CelebrationEvent, Intention, IntentionFilter, IntentionId, IntentionKind, MissaError,
    NewIntention,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::middleware::Holder;
use crate::state::AppState;

/// Query parameters for listing intentions.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
    /// Defaults to true.
    pub active: Option<bool>,
    /// Ignore the active filter altogether.
    #[serde(default)]
    pub all: bool,
}

impl ListQuery {
    fn filter(&self) -> Result<IntentionFilter, MissaError> {
        let mut filter = IntentionFilter::all();
        if let Some(kind) = &self.kind {
            let kind: IntentionKind = kind
                .parse()
                .map_err(|_| MissaError::invalid_enum("kind", kind))?;
            filter = filter.kind(kind);
        }
        if !self.all {
            filter = filter.only_active(self.active.unwrap_or(true));
        }
        Ok(filter)
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub intentions: Vec<Intention>,
    pub total: usize,
}

/// List intentions.
/// GET /api/mass-intentions
pub async fn list_intentions(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let filter = query.filter()?;
    let intentions = state
        .with_engine(&holder, move |engine| engine.list_intentions(&filter))
        .await?;

    let total = intentions.len();
    Ok(Json(ListResponse { intentions, total }))
}

/// Create an intention.
/// POST /api/mass-intentions
pub async fn create_intention(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Json(request): Json<NewIntention>,
) -> ApiResult<(StatusCode, Json<Intention>)> {
    let intention = state
        .with_engine(&holder, move |engine| engine.create_intention(request))
        .await?;
    Ok((StatusCode::CREATED, Json(intention)))
}

/// Get a single intention.
/// GET /api/mass-intentions/:id
pub async fn get_intention(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Path(id): Path<IntentionId>,
) -> ApiResult<Json<Intention>> {
    let intention = state
        .with_engine(&holder, move |engine| engine.get_intention(id))
        .await?;
    Ok(Json(intention))
}

/// Celebration history of an intention.
/// GET /api/mass-intentions/:id/celebrations
pub async fn get_celebrations(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Path(id): Path<IntentionId>,
) -> ApiResult<Json<Vec<CelebrationEvent>>> {
    let events = state
        .with_engine(&holder, move |engine| engine.events_for(id))
        .await?;
    Ok(Json(events))
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub intention_id: IntentionId,
    /// `None` while paused or when no projection is possible.
    pub estimated_end: Option<NaiveDate>,
}

/// Projected completion date of a Bulk intention.
/// GET /api/mass-intentions/:id/estimate
pub async fn get_estimate(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Path(id): Path<IntentionId>,
) -> ApiResult<Json<EstimateResponse>> {
    let estimated_end = state
        .with_engine(&holder, move |engine| engine.estimate(id))
        .await?;
    Ok(Json(EstimateResponse {
        intention_id: id,
        estimated_end,
    }))
}

/// Acknowledge that a Bulk intention has been completed.
/// POST /api/mass-intentions/:id/acknowledge
pub async fn acknowledge_completion(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Path(id): Path<IntentionId>,
) -> ApiResult<Json<Intention>> {
    let intention = state
        .with_engine(&holder, move |engine| engine.acknowledge_completion(id))
        .await?;
    Ok(Json(intention))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub to: NaiveDate,
    pub reason: Option<String>,
}

/// Move a Fixed-Date intention to another day.
/// POST /api/mass-intentions/:id/reschedule
pub async fn reschedule(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Path(id): Path<IntentionId>,
    Json(request): Json<RescheduleRequest>,
) -> ApiResult<Json<Intention>> {
    let intention = state
        .with_engine(&holder, move |engine| {
            engine.reschedule(id, request.to, request.reason)
        })
        .await?;
    Ok(Json(intention))
}
