//! Route definitions for the REST API.

mod celebrations;
mod dashboard;
mod health;
mod import;
mod intentions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Dashboard
        .route("/api/dashboard", get(dashboard::get_dashboard))
        // Recording
        .route("/api/celebrate-mass", post(celebrations::celebrate_mass))
        .route(
            "/api/toggle-bulk-mass-pause",
            post(celebrations::toggle_bulk_mass_pause),
        )
        .route("/api/daily-status", post(celebrations::record_daily_status))
        // Intentions
        .route(
            "/api/mass-intentions",
            get(intentions::list_intentions).post(intentions::create_intention),
        )
        .route("/api/mass-intentions/:id", get(intentions::get_intention))
        .route(
            "/api/mass-intentions/:id/celebrations",
            get(intentions::get_celebrations),
        )
        .route(
            "/api/mass-intentions/:id/estimate",
            get(intentions::get_estimate),
        )
        .route(
            "/api/mass-intentions/:id/acknowledge",
            post(intentions::acknowledge_completion),
        )
        .route(
            "/api/mass-intentions/:id/reschedule",
            post(intentions::reschedule),
        )
        // Import
        .route("/api/import-excel", post(import::import_excel))
        // Attach state
        .with_state(state)
}

pub use celebrations::*;
pub use dashboard::*;
pub use health::*;
pub use import::*;
pub use intentions::*;
