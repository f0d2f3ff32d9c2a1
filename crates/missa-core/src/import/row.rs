//! Spreadsheet rows and import results.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::ImportQuotaPolicy;
use crate::error::MissaError;
use crate::types::{IntentionId, YearMonth};
use chrono::NaiveDate;

/// One row of a historical spreadsheet.
///
/// Cells arrive as text or numbers depending on the exporter, so every field
/// is read leniently and validated by the importer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Date", default, deserialize_with = "cell")]
    pub date: Option<String>,
    #[serde(rename = "Intention", default, deserialize_with = "cell")]
    pub intention: Option<String>,
    #[serde(rename = "Source", default, deserialize_with = "cell")]
    pub source: Option<String>,
    #[serde(rename = "Type", default, deserialize_with = "cell")]
    pub kind: Option<String>,
    #[serde(rename = "Notes", default, deserialize_with = "cell")]
    pub notes: Option<String>,
    #[serde(rename = "Bulk_Remaining", default, deserialize_with = "cell")]
    pub bulk_remaining: Option<String>,
    #[serde(rename = "Bulk_Total", default, deserialize_with = "cell")]
    pub bulk_total: Option<String>,
}

impl ImportRow {
    pub fn new(
        date: impl Into<String>,
        intention: impl Into<String>,
        source: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            date: Some(date.into()),
            intention: Some(intention.into()),
            source: Some(source.into()),
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set the Bulk counters as the spreadsheet records them.
    pub fn with_bulk(mut self, remaining: u32, total: u32) -> Self {
        self.bulk_remaining = Some(remaining.to_string());
        self.bulk_total = Some(total.to_string());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Read a cell as trimmed text; blanks and `NaN` become `None`.
fn cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Cell>::deserialize(deserializer)?;
    Ok(value.and_then(|cell| {
        let text = match cell {
            Cell::Text(s) => s,
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", f as i64),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
        };
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("nan") {
            None
        } else {
            Some(text.to_string())
        }
    }))
}

/// Why a row was not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based row number (line number for JSON Lines input).
    pub row: usize,
    /// Stable error code, e.g. `VAL_003`.
    pub code: String,
    pub reason: String,
}

impl RowRejection {
    pub fn new(row: usize, error: &MissaError) -> Self {
        Self {
            row,
            code: error.code().as_str().to_string(),
            reason: error.to_string(),
        }
    }
}

/// A Personal event accepted past the monthly limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRelaxation {
    pub row: usize,
    pub intention_id: IntentionId,
    pub celebration_date: NaiveDate,
    pub month: YearMonth,
}

/// Outcome of an import batch. Partial success is normal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub intentions_created: usize,
    pub events_recorded: usize,
    /// Rows whose (intention, date) event already existed.
    pub duplicates_skipped: usize,
    pub rejections: Vec<RowRejection>,
    pub quota_policy: ImportQuotaPolicy,
    pub quota_relaxations: Vec<QuotaRelaxation>,
}

impl ImportReport {
    pub fn new(quota_policy: ImportQuotaPolicy) -> Self {
        Self {
            quota_policy,
            ..Self::default()
        }
    }

    /// Check if every row was applied or skipped as a duplicate.
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Fold in rows that failed before reaching the importer.
    pub fn absorb_malformed(&mut self, malformed: Vec<RowRejection>) {
        self.total_rows += malformed.len();
        self.rejections.extend(malformed);
        self.rejections.sort_by_key(|r| r.row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accepts_numbers_and_text() {
        let json = r#"{"Date":"2019-05-01 00:00:00","Intention":"Gregorian series","Source":"Province","Type":"Bulk","Bulk_Remaining":50.0,"Bulk_Total":"100","Notes":"  "}"#;
        let row: ImportRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.bulk_remaining.as_deref(), Some("50"));
        assert_eq!(row.bulk_total.as_deref(), Some("100"));
        assert!(row.notes.is_none());
    }

    #[test]
    fn test_missing_and_null_cells() {
        let row: ImportRow = serde_json::from_str(r#"{"Date":null,"Type":"NaN"}"#).unwrap();
        assert!(row.date.is_none());
        assert!(row.kind.is_none());
        assert!(row.intention.is_none());
    }

    #[test]
    fn test_rejection_uses_stable_code() {
        let rejection = RowRejection::new(4, &MissaError::invalid_date("2031 is outside 2000-2024"));
        assert_eq!(rejection.code, "VAL_003");
        assert!(rejection.reason.contains("2031"));
    }
}
