//! Historical import of intentions and backdated celebrations.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{info, warn};

use super::row::{ImportReport, ImportRow, QuotaRelaxation, RowRejection};
use crate::config::ImportQuotaPolicy;
use crate::error::{MissaError, MissaResult};
use crate::recorder::{CelebrationRecorder, RecordOptions};
use crate::store::IntentionStore;
use crate::types::{
    IntentionId, IntentionKind, IntentionSource, IntentionSpec, NewIntention, YearMonth,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a spreadsheet date cell.
pub fn parse_row_date(raw: &str) -> MissaResult<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| MissaError::invalid_date(format!("'{}' is not a valid date", raw)))
}

fn parse_count(field: &str, raw: &str) -> MissaResult<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
            Ok(f as u32)
        }
        _ => Err(MissaError::validation(format!(
            "{} '{}' is not a non-negative whole number",
            field, raw
        ))),
    }
}

/// A row that passed field validation.
struct ValidRow<'a> {
    date: NaiveDate,
    title: &'a str,
    kind: IntentionKind,
    source: IntentionSource,
}

enum RowOutcome {
    Recorded { relaxed: bool },
    Duplicate,
}

/// Imports spreadsheet rows through the recorder's checks.
pub struct HistoricalImporter<'a> {
    recorder: &'a CelebrationRecorder,
    policy: ImportQuotaPolicy,
}

impl<'a> HistoricalImporter<'a> {
    pub fn new(recorder: &'a CelebrationRecorder, policy: ImportQuotaPolicy) -> Self {
        Self { recorder, policy }
    }

    /// Import rows dated within `[start_year, end_year]`.
    ///
    /// Rows are applied in order so each resolution sees the intentions and
    /// events created by earlier rows. Row failures are collected in the
    /// report and never abort the batch.
    pub fn import<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        rows: &[ImportRow],
        start_year: i32,
        end_year: i32,
    ) -> MissaResult<ImportReport> {
        let numbered = rows.iter().enumerate().map(|(index, row)| (index + 1, row));
        self.import_numbered(store, numbered, start_year, end_year)
    }

    /// Import rows that carry their own source row numbers, such as the
    /// line numbers of a JSON Lines file.
    pub fn import_numbered<'r, S, I>(
        &self,
        store: &S,
        rows: I,
        start_year: i32,
        end_year: i32,
    ) -> MissaResult<ImportReport>
    where
        S: IntentionStore + ?Sized,
        I: IntoIterator<Item = (usize, &'r ImportRow)>,
    {
        if start_year > end_year {
            return Err(MissaError::validation(format!(
                "start_year {} is after end_year {}",
                start_year, end_year
            )));
        }

        let mut report = ImportReport::new(self.policy);
        let mut created_in_batch: HashSet<IntentionId> = HashSet::new();

        for (row_no, row) in rows {
            report.total_rows += 1;
            let outcome = self.import_row(
                store,
                row,
                row_no,
                (start_year, end_year),
                &mut created_in_batch,
                &mut report,
            );
            match outcome {
                Ok(RowOutcome::Recorded { relaxed }) => {
                    report.events_recorded += 1;
                    if relaxed {
                        warn!(row = row_no, "Personal quota relaxed for imported row");
                    }
                }
                Ok(RowOutcome::Duplicate) => report.duplicates_skipped += 1,
                Err(e) => {
                    warn!(row = row_no, code = e.code().as_str(), error = %e, "Rejected import row");
                    report.rejections.push(RowRejection::new(row_no, &e));
                }
            }
        }

        info!(
            total = report.total_rows,
            created = report.intentions_created,
            recorded = report.events_recorded,
            duplicates = report.duplicates_skipped,
            rejected = report.rejections.len(),
            relaxed = report.quota_relaxations.len(),
            "Import finished"
        );

        Ok(report)
    }

    fn import_row<S: IntentionStore + ?Sized>(
        &self,
        store: &S,
        row: &ImportRow,
        row_no: usize,
        (start_year, end_year): (i32, i32),
        created_in_batch: &mut HashSet<IntentionId>,
        report: &mut ImportReport,
    ) -> MissaResult<RowOutcome> {
        let valid = validate(row, start_year, end_year)?;

        let intention = match store.find_by_natural_key(valid.title, valid.kind, valid.source)? {
            Some(existing) => existing,
            None => {
                let created = store.create(new_intention(row, &valid)?)?;
                created_in_batch.insert(created.id);
                report.intentions_created += 1;
                created
            }
        };

        if store.has_event_on(intention.id, valid.date)? {
            return Ok(RowOutcome::Duplicate);
        }

        let mut options = RecordOptions::import(self.policy == ImportQuotaPolicy::Relax);
        if valid.kind == IntentionKind::Bulk && created_in_batch.contains(&intention.id) {
            // Counters from the sheet already reflect these rows
            options = options.append_only();
        }

        let committed = self.recorder.record_with_options(
            store,
            intention.id,
            valid.date,
            row.notes.clone(),
            options,
        )?;

        let relaxed = committed.event.quota_relaxed;
        if relaxed {
            report.quota_relaxations.push(QuotaRelaxation {
                row: row_no,
                intention_id: intention.id,
                celebration_date: valid.date,
                month: YearMonth::of(valid.date),
            });
        }
        Ok(RowOutcome::Recorded { relaxed })
    }
}

fn required<'r>(value: &'r Option<String>, field: &str) -> MissaResult<&'r str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MissaError::missing_field(field))
}

fn validate(row: &ImportRow, start_year: i32, end_year: i32) -> MissaResult<ValidRow<'_>> {
    let raw_date = required(&row.date, "Date")?;
    let title = required(&row.intention, "Intention")?;
    let raw_source = required(&row.source, "Source")?;
    let raw_kind = required(&row.kind, "Type")?;

    let date = parse_row_date(raw_date)?;
    if !(start_year..=end_year).contains(&date.year()) {
        return Err(MissaError::invalid_date(format!(
            "{} is outside {}-{}",
            date, start_year, end_year
        )));
    }

    let kind = IntentionKind::from_str(raw_kind)
        .map_err(|_| MissaError::invalid_enum("type", raw_kind))?;
    let source = IntentionSource::from_str(raw_source)
        .map_err(|_| MissaError::invalid_enum("source", raw_source))?;

    Ok(ValidRow {
        date,
        title,
        kind,
        source,
    })
}

fn new_intention(row: &ImportRow, valid: &ValidRow<'_>) -> MissaResult<NewIntention> {
    let spec = match valid.kind {
        IntentionKind::Personal => IntentionSpec::Personal,
        IntentionKind::FixedDate => IntentionSpec::FixedDate {
            original_date: valid.date,
        },
        IntentionKind::Special => IntentionSpec::Special,
        IntentionKind::Bulk => {
            let total = parse_count("Bulk_Total", required(&row.bulk_total, "Bulk_Total")?)?;
            let remaining =
                parse_count("Bulk_Remaining", required(&row.bulk_remaining, "Bulk_Remaining")?)?;
            IntentionSpec::Bulk {
                total_masses: total,
                remaining_masses: Some(remaining),
                start_date: valid.date,
            }
        }
    };
    Ok(NewIntention::new(valid.title, valid.source, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EstimateCache;
    use crate::store::SqliteIntentionStore;
    use crate::types::IntentionState;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recorder() -> CelebrationRecorder {
        CelebrationRecorder::new(3, Arc::new(EstimateCache::new()))
    }

    #[test]
    fn test_parse_row_date_formats() {
        assert_eq!(parse_row_date("2019-05-01").unwrap(), date(2019, 5, 1));
        assert_eq!(parse_row_date("2019-05-01 00:00:00").unwrap(), date(2019, 5, 1));
        assert_eq!(parse_row_date("2019-05-01T08:30:00").unwrap(), date(2019, 5, 1));
        assert!(parse_row_date("01/05/2019").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("Bulk_Total", "100").unwrap(), 100);
        assert_eq!(parse_count("Bulk_Total", "100.0").unwrap(), 100);
        assert!(parse_count("Bulk_Total", "-1").is_err());
        assert!(parse_count("Bulk_Total", "ten").is_err());
    }

    #[test]
    fn test_rejections_carry_kind_and_row() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Relax);
        let rows = vec![
            ImportRow::new("2031-01-01", "Own", "Personal", "Personal"),
            ImportRow::new("2020-01-01", "Own", "Diocese", "Personal"),
            ImportRow::new("2020-01-01", "Own", "Personal", "Weekly"),
            ImportRow {
                intention: None,
                ..ImportRow::new("2020-01-01", "x", "Personal", "Personal")
            },
            ImportRow::new("2020-01-01", "Series", "Province", "Bulk"),
            ImportRow::new("2020-01-02", "Own", "Personal", "Personal"),
        ];

        let report = importer.import(&store, &rows, 2000, 2024).unwrap();

        let codes: Vec<(usize, &str)> = report
            .rejections
            .iter()
            .map(|r| (r.row, r.code.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (1, "VAL_003"),
                (2, "VAL_004"),
                (3, "VAL_004"),
                (4, "VAL_002"),
                (5, "VAL_002"),
            ]
        );
        assert_eq!(report.events_recorded, 1);
        assert_eq!(report.intentions_created, 1);
        assert_eq!(report.total_rows, 6);
    }

    #[test]
    fn test_fixed_date_created_on_row_date() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Relax);
        let rows = vec![
            ImportRow::new("2020-06-01", "Anniversary", "Individual", "Fixed-Date")
                .with_notes("requested by the family"),
            ImportRow::new("2020-06-02", "Anniversary", "Individual", "Fixed-Date"),
        ];

        let report = importer.import(&store, &rows, 2000, 2024).unwrap();
        assert_eq!(report.events_recorded, 1);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].code, "INT_002");

        let intention = store
            .find_by_natural_key("Anniversary", IntentionKind::FixedDate, IntentionSource::Individual)
            .unwrap()
            .unwrap();
        assert_eq!(intention.due_date(), Some(date(2020, 6, 1)));
        assert!(!intention.is_active());
        let events = store.events_for(intention.id).unwrap();
        assert_eq!(events[0].notes.as_deref(), Some("requested by the family"));
    }

    #[test]
    fn test_enforced_quota_rejects_fourth_personal_row() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Enforce);
        let rows: Vec<ImportRow> = (1..=4)
            .map(|d| ImportRow::new(format!("2020-03-0{}", d), "Own", "Personal", "Personal"))
            .collect();

        let report = importer.import(&store, &rows, 2000, 2024).unwrap();
        assert_eq!(report.events_recorded, 3);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].code, "QTA_001");
        assert!(report.quota_relaxations.is_empty());
    }

    #[test]
    fn test_relaxed_quota_is_reported() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Relax);
        let rows: Vec<ImportRow> = (1..=5)
            .map(|d| ImportRow::new(format!("2020-03-0{}", d), "Own", "Personal", "Personal"))
            .collect();

        let report = importer.import(&store, &rows, 2000, 2024).unwrap();
        assert_eq!(report.events_recorded, 5);
        assert!(report.is_clean());
        let relaxed_rows: Vec<usize> = report.quota_relaxations.iter().map(|r| r.row).collect();
        assert_eq!(relaxed_rows, vec![4, 5]);
    }

    #[test]
    fn test_existing_bulk_rows_decrement() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Relax);

        let first = vec![ImportRow::new("2021-01-01", "Series", "Generalate", "Bulk").with_bulk(10, 12)];
        importer.import(&store, &first, 2000, 2024).unwrap();

        // A later batch for the same intention consumes masses and ignores sheet counters
        let later = vec![
            ImportRow::new("2021-02-01", "Series", "Generalate", "Bulk").with_bulk(99, 99),
            ImportRow::new("2021-02-08", "Series", "Generalate", "Bulk"),
        ];
        let report = importer.import(&store, &later, 2000, 2024).unwrap();
        assert_eq!(report.intentions_created, 0);
        assert_eq!(report.events_recorded, 2);

        let bulk = store
            .find_by_natural_key("Series", IntentionKind::Bulk, IntentionSource::Generalate)
            .unwrap()
            .unwrap();
        match bulk.state {
            IntentionState::Bulk {
                total_masses,
                remaining_masses,
                celebration_history,
                ..
            } => {
                assert_eq!(total_masses, 12);
                assert_eq!(remaining_masses, 8);
                assert_eq!(celebration_history.len(), 3);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_reversed_year_range_fails_batch() {
        let store = SqliteIntentionStore::in_memory().unwrap();
        let recorder = recorder();
        let importer = HistoricalImporter::new(&recorder, ImportQuotaPolicy::Relax);
        assert!(importer.import(&store, &[], 2024, 2000).is_err());
    }
}
