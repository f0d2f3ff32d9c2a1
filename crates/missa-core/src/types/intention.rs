//! Intention types.
//!
//! An intention's kind decides which auxiliary state it carries. The state is
//! a tagged union so the recorder and estimator must match every kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::error::{MissaError, MissaResult};

/// Identifier of an intention.
pub type IntentionId = Uuid;

/// Identity of the holder whose intentions an engine manages.
///
/// Resolved by the calling layer; the engine trusts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Create a holder id, rejecting blank values and path separators.
    pub fn new(id: impl Into<String>) -> MissaResult<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(MissaError::validation("holder id must not be empty"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
            || id.starts_with('.')
        {
            return Err(MissaError::validation(format!(
                "holder id '{}' contains unsupported characters",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of mass intention.
///
/// Parsing is case-insensitive and accepts the spreadsheet spelling
/// `Fixed-Date` as well as `FixedDate` and `fixed_date`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum IntentionKind {
    /// The holder's own monthly masses.
    Personal,
    /// Bound to one calendar date, fulfilled once.
    #[strum(to_string = "fixed_date", serialize = "fixed-date", serialize = "fixeddate")]
    FixedDate,
    /// Many masses tracked by remaining/total counters.
    Bulk,
    /// Fulfilled once, without a binding date.
    Special,
}

/// Where an intention came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum IntentionSource {
    Personal,
    Province,
    Generalate,
    Individual,
}

/// Type-specific state of an intention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentionState {
    /// Quota is derived from events, nothing is stored per intention.
    Personal,
    FixedDate {
        /// Immutable binding date.
        original_date: NaiveDate,
        is_celebrated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        celebrated_on: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rescheduled_date: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reschedule_reason: Option<String>,
    },
    Bulk {
        /// Immutable after creation.
        total_masses: u32,
        remaining_masses: u32,
        is_paused: bool,
        start_date: NaiveDate,
        /// Celebration dates, ascending.
        #[serde(default)]
        celebration_history: Vec<NaiveDate>,
        #[serde(default)]
        completion_acknowledged: bool,
    },
    Special {
        is_celebrated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        celebrated_on: Option<NaiveDate>,
    },
}

impl IntentionState {
    /// The kind this state belongs to.
    pub fn kind(&self) -> IntentionKind {
        match self {
            Self::Personal => IntentionKind::Personal,
            Self::FixedDate { .. } => IntentionKind::FixedDate,
            Self::Bulk { .. } => IntentionKind::Bulk,
            Self::Special { .. } => IntentionKind::Special,
        }
    }

    /// Whether more celebrations can still be recorded against it.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Personal => true,
            Self::FixedDate { is_celebrated, .. } | Self::Special { is_celebrated, .. } => {
                !is_celebrated
            }
            Self::Bulk {
                remaining_masses, ..
            } => *remaining_masses > 0,
        }
    }
}

/// A mass intention held by one holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intention {
    /// Unique identifier
    pub id: IntentionId,
    pub title: String,
    pub source: IntentionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Type-specific state
    pub state: IntentionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Advances on every applied mutation; the compare-and-set token.
    pub version: u64,
}

impl Intention {
    pub fn kind(&self) -> IntentionKind {
        self.state.kind()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Date a Fixed-Date intention is due: the rescheduled date if any.
    pub fn due_date(&self) -> Option<NaiveDate> {
        match &self.state {
            IntentionState::FixedDate {
                original_date,
                rescheduled_date,
                ..
            } => Some(rescheduled_date.unwrap_or(*original_date)),
            _ => None,
        }
    }
}

/// Kind-specific parameters for creating an intention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentionSpec {
    Personal,
    FixedDate {
        original_date: NaiveDate,
    },
    Bulk {
        total_masses: u32,
        /// Defaults to `total_masses`.
        #[serde(default)]
        remaining_masses: Option<u32>,
        start_date: NaiveDate,
    },
    Special,
}

impl IntentionSpec {
    pub fn kind(&self) -> IntentionKind {
        match self {
            Self::Personal => IntentionKind::Personal,
            Self::FixedDate { .. } => IntentionKind::FixedDate,
            Self::Bulk { .. } => IntentionKind::Bulk,
            Self::Special => IntentionKind::Special,
        }
    }

    /// Initial state for a newly created intention.
    pub(crate) fn initial_state(&self) -> MissaResult<IntentionState> {
        Ok(match self {
            Self::Personal => IntentionState::Personal,
            Self::FixedDate { original_date } => IntentionState::FixedDate {
                original_date: *original_date,
                is_celebrated: false,
                celebrated_on: None,
                rescheduled_date: None,
                reschedule_reason: None,
            },
            Self::Bulk {
                total_masses,
                remaining_masses,
                start_date,
            } => {
                let remaining = remaining_masses.unwrap_or(*total_masses);
                if *total_masses == 0 {
                    return Err(MissaError::validation("total_masses must be positive"));
                }
                if remaining > *total_masses {
                    return Err(MissaError::validation(format!(
                        "remaining_masses {} exceeds total_masses {}",
                        remaining, total_masses
                    )));
                }
                IntentionState::Bulk {
                    total_masses: *total_masses,
                    remaining_masses: remaining,
                    is_paused: false,
                    start_date: *start_date,
                    celebration_history: Vec::new(),
                    completion_acknowledged: false,
                }
            }
            Self::Special => IntentionState::Special {
                is_celebrated: false,
                celebrated_on: None,
            },
        })
    }
}

/// Request to create an intention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntention {
    pub title: String,
    pub source: IntentionSource,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub spec: IntentionSpec,
}

impl NewIntention {
    /// Create a new intention request.
    pub fn new(title: impl Into<String>, source: IntentionSource, spec: IntentionSpec) -> Self {
        Self {
            title: title.into(),
            source,
            notes: None,
            spec,
        }
    }

    pub fn personal(title: impl Into<String>) -> Self {
        Self::new(title, IntentionSource::Personal, IntentionSpec::Personal)
    }

    pub fn fixed_date(
        title: impl Into<String>,
        source: IntentionSource,
        original_date: NaiveDate,
    ) -> Self {
        Self::new(title, source, IntentionSpec::FixedDate { original_date })
    }

    pub fn bulk(
        title: impl Into<String>,
        source: IntentionSource,
        total_masses: u32,
        start_date: NaiveDate,
    ) -> Self {
        Self::new(
            title,
            source,
            IntentionSpec::Bulk {
                total_masses,
                remaining_masses: None,
                start_date,
            },
        )
    }

    pub fn special(title: impl Into<String>, source: IntentionSource) -> Self {
        Self::new(title, source, IntentionSpec::Special)
    }

    /// Builder method to set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builder method to start a Bulk intention part-way through
    pub fn with_remaining(mut self, remaining: u32) -> Self {
        if let IntentionSpec::Bulk {
            remaining_masses, ..
        } = &mut self.spec
        {
            *remaining_masses = Some(remaining);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_spreadsheet_spellings() {
        for raw in ["Fixed-Date", "FixedDate", "fixed_date", "FIXED-DATE"] {
            assert_eq!(raw.parse::<IntentionKind>().unwrap(), IntentionKind::FixedDate);
        }
        assert_eq!("Bulk".parse::<IntentionKind>().unwrap(), IntentionKind::Bulk);
        assert!("Weekly".parse::<IntentionKind>().is_err());
        assert_eq!(IntentionKind::FixedDate.to_string(), "fixed_date");
    }

    #[test]
    fn test_source_parses_case_insensitively() {
        assert_eq!(
            "Generalate".parse::<IntentionSource>().unwrap(),
            IntentionSource::Generalate
        );
        assert!("Diocese".parse::<IntentionSource>().is_err());
    }

    #[test]
    fn test_holder_id_validation() {
        assert!(HolderId::new("fr.john@example.org").is_ok());
        assert!(HolderId::new("  ").is_err());
        assert!(HolderId::new("../etc").is_err());
    }

    #[test]
    fn test_bulk_spec_rejects_inconsistent_counters() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let spec = IntentionSpec::Bulk {
            total_masses: 10,
            remaining_masses: Some(11),
            start_date: start,
        };
        assert!(spec.initial_state().is_err());

        let spec = IntentionSpec::Bulk {
            total_masses: 0,
            remaining_masses: None,
            start_date: start,
        };
        assert!(spec.initial_state().is_err());
    }

    #[test]
    fn test_new_intention_deserializes_flattened_spec() {
        let json = r#"{"title":"Gregorian series","source":"province","kind":"bulk","total_masses":30,"start_date":"2024-03-01"}"#;
        let new: NewIntention = serde_json::from_str(json).unwrap();
        assert_eq!(new.spec.kind(), IntentionKind::Bulk);
        assert_eq!(new.source, IntentionSource::Province);
    }

    #[test]
    fn test_active_rules() {
        assert!(IntentionState::Personal.is_active());
        let exhausted = IntentionState::Bulk {
            total_masses: 5,
            remaining_masses: 0,
            is_paused: false,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            celebration_history: vec![],
            completion_acknowledged: false,
        };
        assert!(!exhausted.is_active());
        let done = IntentionState::Special {
            is_celebrated: true,
            celebrated_on: None,
        };
        assert!(!done.is_active());
    }
}
