//! State mutations and their compare-and-set preconditions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{MissaError, MissaResult};
use crate::types::IntentionState;

/// A conditional change to one intention's state.
///
/// Each variant carries the state the caller observed. Applying it to a state
/// that no longer matches fails with `StaleState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Consume one Bulk mass and record its date.
    DecrementBulk {
        expected_remaining: u32,
        celebrated_on: NaiveDate,
    },
    /// Record a backfilled Bulk date without touching the counters.
    AppendBulkHistory { celebrated_on: NaiveDate },
    /// Fulfil a Fixed-Date or Special intention.
    MarkCelebrated { celebrated_on: NaiveDate },
    /// Flip the Bulk pause flag.
    TogglePause { expected_paused: bool },
    /// Silence the completion alert of an exhausted Bulk intention.
    AcknowledgeCompletion,
    /// Move an uncelebrated Fixed-Date intention to another day.
    Reschedule {
        to: NaiveDate,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DecrementBulk { .. } => "decrement_bulk",
            Self::AppendBulkHistory { .. } => "append_bulk_history",
            Self::MarkCelebrated { .. } => "mark_celebrated",
            Self::TogglePause { .. } => "toggle_pause",
            Self::AcknowledgeCompletion => "acknowledge_completion",
            Self::Reschedule { .. } => "reschedule",
        }
    }

    /// Compute the state after this mutation, or fail if the precondition no longer holds.
    pub fn apply(&self, state: &IntentionState) -> MissaResult<IntentionState> {
        let mut next = state.clone();
        match (self, &mut next) {
            (
                Self::DecrementBulk {
                    expected_remaining,
                    celebrated_on,
                },
                IntentionState::Bulk {
                    remaining_masses,
                    is_paused,
                    celebration_history,
                    ..
                },
            ) => {
                if *remaining_masses != *expected_remaining || *remaining_masses == 0 {
                    return Err(MissaError::stale(format!(
                        "expected {} remaining masses, found {}",
                        expected_remaining, remaining_masses
                    )));
                }
                if *is_paused {
                    return Err(MissaError::stale("bulk intention was paused"));
                }
                *remaining_masses -= 1;
                insert_sorted(celebration_history, *celebrated_on);
            }
            (
                Self::AppendBulkHistory { celebrated_on },
                IntentionState::Bulk {
                    celebration_history,
                    ..
                },
            ) => {
                insert_sorted(celebration_history, *celebrated_on);
            }
            (
                Self::MarkCelebrated { celebrated_on: on },
                IntentionState::FixedDate {
                    is_celebrated,
                    celebrated_on,
                    ..
                }
                | IntentionState::Special {
                    is_celebrated,
                    celebrated_on,
                },
            ) => {
                if *is_celebrated {
                    return Err(MissaError::stale("intention was already celebrated"));
                }
                *is_celebrated = true;
                *celebrated_on = Some(*on);
            }
            (
                Self::TogglePause { expected_paused },
                IntentionState::Bulk { is_paused, .. },
            ) => {
                if *is_paused != *expected_paused {
                    return Err(MissaError::stale(format!(
                        "expected paused={}, found paused={}",
                        expected_paused, is_paused
                    )));
                }
                *is_paused = !*is_paused;
            }
            (
                Self::AcknowledgeCompletion,
                IntentionState::Bulk {
                    remaining_masses,
                    completion_acknowledged,
                    ..
                },
            ) => {
                if *remaining_masses != 0 || *completion_acknowledged {
                    return Err(MissaError::stale(
                        "bulk intention is not awaiting acknowledgement",
                    ));
                }
                *completion_acknowledged = true;
            }
            (
                Self::Reschedule { to, reason },
                IntentionState::FixedDate {
                    is_celebrated,
                    rescheduled_date,
                    reschedule_reason,
                    ..
                },
            ) => {
                if *is_celebrated {
                    return Err(MissaError::stale("intention was already celebrated"));
                }
                *rescheduled_date = Some(*to);
                *reschedule_reason = reason.clone();
            }
            (mutation, state) => {
                return Err(MissaError::validation(format!(
                    "mutation '{}' does not apply to {} intentions",
                    mutation.name(),
                    state.kind()
                )));
            }
        }
        Ok(next)
    }
}

fn insert_sorted(history: &mut Vec<NaiveDate>, date: NaiveDate) {
    let pos = history.partition_point(|d| *d <= date);
    history.insert(pos, date);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bulk(remaining: u32, paused: bool) -> IntentionState {
        IntentionState::Bulk {
            total_masses: 10,
            remaining_masses: remaining,
            is_paused: paused,
            start_date: date(2024, 1, 1),
            celebration_history: vec![date(2024, 1, 5)],
            completion_acknowledged: false,
        }
    }

    #[test]
    fn test_decrement_requires_expected_remaining() {
        let state = bulk(4, false);
        let next = Mutation::DecrementBulk {
            expected_remaining: 4,
            celebrated_on: date(2024, 1, 3),
        }
        .apply(&state)
        .unwrap();
        match next {
            IntentionState::Bulk {
                remaining_masses,
                celebration_history,
                ..
            } => {
                assert_eq!(remaining_masses, 3);
                // Out-of-order dates land in sorted position
                assert_eq!(celebration_history, vec![date(2024, 1, 3), date(2024, 1, 5)]);
            }
            other => panic!("unexpected state {other:?}"),
        }

        let stale = Mutation::DecrementBulk {
            expected_remaining: 5,
            celebrated_on: date(2024, 1, 3),
        }
        .apply(&state);
        assert!(matches!(stale, Err(MissaError::StaleState { .. })));
    }

    #[test]
    fn test_decrement_never_goes_below_zero() {
        let result = Mutation::DecrementBulk {
            expected_remaining: 0,
            celebrated_on: date(2024, 1, 3),
        }
        .apply(&bulk(0, false));
        assert!(matches!(result, Err(MissaError::StaleState { .. })));
    }

    #[test]
    fn test_decrement_fails_when_paused_meanwhile() {
        let result = Mutation::DecrementBulk {
            expected_remaining: 4,
            celebrated_on: date(2024, 1, 3),
        }
        .apply(&bulk(4, true));
        assert!(matches!(result, Err(MissaError::StaleState { .. })));
    }

    #[test]
    fn test_toggle_pause_is_conditional() {
        let paused = Mutation::TogglePause {
            expected_paused: false,
        }
        .apply(&bulk(4, false))
        .unwrap();
        assert!(matches!(paused, IntentionState::Bulk { is_paused: true, .. }));

        let stale = Mutation::TogglePause {
            expected_paused: false,
        }
        .apply(&paused);
        assert!(matches!(stale, Err(MissaError::StaleState { .. })));
    }

    #[test]
    fn test_mark_celebrated_once() {
        let state = IntentionState::Special {
            is_celebrated: false,
            celebrated_on: None,
        };
        let mutation = Mutation::MarkCelebrated {
            celebrated_on: date(2024, 2, 2),
        };
        let done = mutation.apply(&state).unwrap();
        assert_eq!(
            done,
            IntentionState::Special {
                is_celebrated: true,
                celebrated_on: Some(date(2024, 2, 2)),
            }
        );
        assert!(matches!(mutation.apply(&done), Err(MissaError::StaleState { .. })));
    }

    #[test]
    fn test_wrong_kind_is_a_validation_error() {
        let result = Mutation::TogglePause {
            expected_paused: false,
        }
        .apply(&IntentionState::Personal);
        assert!(matches!(result, Err(MissaError::Validation { .. })));
    }

    #[test]
    fn test_acknowledge_only_when_exhausted() {
        assert!(Mutation::AcknowledgeCompletion.apply(&bulk(2, false)).is_err());
        let acked = Mutation::AcknowledgeCompletion.apply(&bulk(0, false)).unwrap();
        assert!(matches!(
            acked,
            IntentionState::Bulk {
                completion_acknowledged: true,
                ..
            }
        ));
    }

    #[test]
    fn test_reschedule_keeps_original_date() {
        let state = IntentionState::FixedDate {
            original_date: date(2024, 6, 1),
            is_celebrated: false,
            celebrated_on: None,
            rescheduled_date: None,
            reschedule_reason: None,
        };
        let next = Mutation::Reschedule {
            to: date(2024, 6, 3),
            reason: Some("funeral".into()),
        }
        .apply(&state)
        .unwrap();
        match next {
            IntentionState::FixedDate {
                original_date,
                rescheduled_date,
                ..
            } => {
                assert_eq!(original_date, date(2024, 6, 1));
                assert_eq!(rescheduled_date, Some(date(2024, 6, 3)));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
