//! Historical spreadsheet import endpoint.

use axum::{extract::State, Json};
use chrono::{Datelike, Utc};
use missa_core::{ImportReport, ImportRow};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;
use crate::middleware::Holder;
use crate::state::AppState;

const DEFAULT_START_YEAR: i32 = 2000;

/// Request body for an import batch.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<ImportRow>,
    /// Defaults to 2000.
    pub start_year: Option<i32>,
    /// Defaults to the current year.
    pub end_year: Option<i32>,
}

/// Import historical celebration rows.
/// POST /api/import-excel
pub async fn import_excel(
    State(state): State<AppState>,
    Holder(holder): Holder,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    let start_year = request.start_year.unwrap_or(DEFAULT_START_YEAR);
    let end_year = request.end_year.unwrap_or_else(|| Utc::now().year());
    let rows = request.rows;

    info!(holder = %holder, rows = rows.len(), start_year, end_year, "Import requested");
    let report = state
        .with_engine(&holder, move |engine| {
            engine.import(&rows, start_year, end_year)
        })
        .await?;
    Ok(Json(report))
}
