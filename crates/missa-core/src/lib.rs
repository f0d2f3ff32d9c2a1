//! missa-core - Core library for missa.
//!
//! This crate tracks fulfillment of mass intentions: it stores intentions and
//! their kind-specific state, records celebrations under the rules of each
//! kind, projects Bulk completion dates, builds dashboard snapshots and
//! imports historical spreadsheets.
//!
//! # Example
//!
//! ```ignore
//! use missa_core::{EngineConfig, HolderId, IntentionEngine, IntentionSource, NewIntention};
//!
//! let engine = IntentionEngine::open(EngineConfig::default(), HolderId::new("fr-anselm")?)?;
//!
//! let series = engine.create_intention(NewIntention::bulk(
//!     "Gregorian series",
//!     IntentionSource::Province,
//!     30,
//!     today,
//! ))?;
//! engine.celebrate(series.id, today, None)?;
//! println!("{:?}", engine.estimate(series.id)?);
//! ```

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod import;
pub mod recorder;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, ImportQuotaPolicy};
pub use dashboard::{Alert, AlertKind, DashboardAggregator, DashboardSnapshot};
pub use engine::IntentionEngine;
pub use error::{ErrorCode, MissaError, MissaResult};
pub use estimator::{BulkScheduleEstimator, EstimateCache};
pub use import::{read_rows_jsonl, HistoricalImporter, ImportReport, ImportRow, RowRejection};
pub use recorder::{CelebrationRecorder, RecordOptions};
pub use store::{
    CommittedCelebration, IntentionFilter, IntentionStore, Mutation, SqliteIntentionStore,
};
pub use types::{
    CelebrationEvent, DailyStatus, EventOrigin, HolderId, Intention, IntentionId, IntentionKind,
    IntentionSource, IntentionSpec, IntentionState, MonthRange, NewIntention, YearMonth,
};
