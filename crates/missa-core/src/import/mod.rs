//! Historical import from spreadsheet exports.
//!
//! Rows are resolved to intentions by (title, type, source) and recorded as
//! backdated events, so re-running an import over overlapping data creates
//! neither duplicate intentions nor duplicate events.
//!
//! # Example
//!
//! ```ignore
//! use missa_core::import::{read_rows_jsonl, ImportRow};
//!
//! let rows = vec![
//!     ImportRow::new("2019-03-04", "Gregorian series", "Province", "Bulk").with_bulk(50, 100),
//!     ImportRow::new("2019-03-05", "Own intention", "Personal", "Personal"),
//! ];
//! let report = engine.import(&rows, 2019, 2021)?;
//! println!("{} events, {} rejected", report.events_recorded, report.rejections.len());
//! ```

mod importer;
pub mod jsonl;
mod row;

pub use importer::{parse_row_date, HistoricalImporter};
pub use jsonl::{read_rows_jsonl, ParsedRows};
pub use row::{ImportReport, ImportRow, QuotaRelaxation, RowRejection};
