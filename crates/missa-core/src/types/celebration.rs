//! Celebration events, daily status and calendar-month helpers.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use super::intention::IntentionId;
use crate::error::{MissaError, MissaResult};

/// How an event entered the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// Recorded by the holder as it happened.
    Live,
    /// Backfilled by the historical importer.
    Import,
}

/// One act of fulfillment. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelebrationEvent {
    pub id: Uuid,
    pub intention_id: IntentionId,
    pub celebration_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub origin: EventOrigin,
    /// Set when the monthly Personal limit was waived for this event.
    #[serde(default)]
    pub quota_relaxed: bool,
    pub created_at: DateTime<Utc>,
}

impl CelebrationEvent {
    pub fn new(
        intention_id: IntentionId,
        celebration_date: NaiveDate,
        notes: Option<String>,
        origin: EventOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            intention_id,
            celebration_date,
            notes: notes.filter(|n| !n.trim().is_empty()),
            origin,
            quota_relaxed: false,
            created_at: Utc::now(),
        }
    }
}

/// Whether the holder celebrated a mass on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub date: NaiveDate,
    pub celebrated_mass: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_not_celebrated: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DailyStatus {
    pub fn celebrated(date: NaiveDate) -> Self {
        Self {
            date,
            celebrated_mass: true,
            reason_not_celebrated: None,
            updated_at: Utc::now(),
        }
    }

    pub fn not_celebrated(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            date,
            celebrated_mass: false,
            reason_not_celebrated: Some(reason.into()),
            updated_at: Utc::now(),
        }
    }
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> MissaResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(MissaError::invalid_date(format!("month {} out of range", month)));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(MissaError::invalid_date(format!("year {} out of range", year)));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .and_then(|next| next.first_day().pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// The following month, or `None` past the last representable date.
    pub fn next(&self) -> Option<Self> {
        let (year, month) = if self.month == 12 {
            (self.year.checked_add(1)?, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = MissaError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| MissaError::invalid_date(format!("'{}' is not YYYY-MM", s)))?;
        let year = year
            .parse()
            .map_err(|_| MissaError::invalid_date(format!("'{}' is not YYYY-MM", s)))?;
        let month = month
            .parse()
            .map_err(|_| MissaError::invalid_date(format!("'{}' is not YYYY-MM", s)))?;
        Self::new(year, month)
    }
}

/// Longest range a caller may request.
pub const MAX_RANGE_MONTHS: i64 = 120;

/// Inclusive range of calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub from: YearMonth,
    pub to: YearMonth,
}

impl MonthRange {
    pub fn new(from: YearMonth, to: YearMonth) -> MissaResult<Self> {
        if from > to {
            return Err(MissaError::validation(format!(
                "month range start {} is after end {}",
                from, to
            )));
        }
        let span = (to.year as i64 - from.year as i64) * 12 + to.month as i64 - from.month as i64 + 1;
        if span > MAX_RANGE_MONTHS {
            return Err(MissaError::validation_with_suggestion(
                format!("month range {}..{} spans {} months", from, to, span),
                format!("request at most {} months at a time", MAX_RANGE_MONTHS),
            ));
        }
        Ok(Self { from, to })
    }

    pub fn single(month: YearMonth) -> Self {
        Self {
            from: month,
            to: month,
        }
    }

    /// Months in the range, ascending.
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = self.from;
        while current <= self.to {
            months.push(current);
            match current.next() {
                Some(next) => current = next,
                None => break,
            }
        }
        months
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_parse_and_display() {
        let ym: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(ym, YearMonth { year: 2024, month: 2 });
        assert_eq!(ym.to_string(), "2024-02");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("202402".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_month_range_crosses_year() {
        let range = MonthRange::new(
            YearMonth::new(2023, 11).unwrap(),
            YearMonth::new(2024, 2).unwrap(),
        )
        .unwrap();
        let months: Vec<String> = range.months().iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_month_range_rejects_reversed() {
        assert!(MonthRange::new(
            YearMonth::new(2024, 3).unwrap(),
            YearMonth::new(2024, 1).unwrap()
        )
        .is_err());
    }

    #[test]
    fn test_year_month_rejects_unrepresentable_years() {
        assert!("2147483647-12".parse::<YearMonth>().is_err());
        assert!(YearMonth::new(-2147483648, 1).is_err());
    }

    #[test]
    fn test_last_representable_month_has_no_successor() {
        let last = YearMonth::of(NaiveDate::MAX);
        assert_eq!(last.next(), None);
        assert_eq!(last.last_day(), NaiveDate::MAX);
        assert_eq!(MonthRange::single(last).months(), vec![last]);
    }

    #[test]
    fn test_month_range_length_is_capped() {
        let err = MonthRange::new(
            YearMonth::new(1, 1).unwrap(),
            YearMonth::new(9999, 12).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, MissaError::Validation { .. }));
        assert!(err.suggestion().is_some());

        let ten_years = MonthRange::new(
            YearMonth::new(2015, 1).unwrap(),
            YearMonth::new(2024, 12).unwrap(),
        )
        .unwrap();
        assert_eq!(ten_years.months().len(), 120);
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let event = CelebrationEvent::new(Uuid::new_v4(), date, Some("  ".into()), EventOrigin::Live);
        assert!(event.notes.is_none());
    }
}
