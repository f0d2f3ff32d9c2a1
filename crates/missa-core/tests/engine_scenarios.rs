//! End-to-end recording, estimation and dashboard scenarios.

use chrono::{Duration, NaiveDate};
use missa_core::{
    AlertKind, EngineConfig, HolderId, IntentionEngine, IntentionFilter, IntentionId, IntentionKind,
    IntentionSource, IntentionState, IntentionStore, MissaError, Mutation, NewIntention,
    SqliteIntentionStore,
};
use std::sync::Arc;
use std::thread;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn engine() -> IntentionEngine {
    IntentionEngine::in_memory(EngineConfig::default(), HolderId::new("fr-anselm").unwrap()).unwrap()
}

fn remaining(engine: &IntentionEngine, id: IntentionId) -> u32 {
    match engine.get_intention(id).unwrap().state {
        IntentionState::Bulk {
            remaining_masses, ..
        } => remaining_masses,
        other => panic!("not a bulk intention: {other:?}"),
    }
}

#[test]
fn test_bulk_remaining_stays_within_bounds() {
    let engine = engine();
    let bulk = engine
        .create_intention(NewIntention::bulk("Triduum", IntentionSource::Individual, 3, date(2024, 1, 1)))
        .unwrap();

    let mut outcomes = Vec::new();
    for day in 1..=5 {
        outcomes.push(engine.celebrate(bulk.id, date(2024, 1, day), None).is_ok());
        let left = remaining(&engine, bulk.id);
        assert!(left <= 3);
    }

    assert_eq!(outcomes, vec![true, true, true, false, false]);
    assert_eq!(remaining(&engine, bulk.id), 0);
    assert!(matches!(
        engine.celebrate(bulk.id, date(2024, 1, 6), None),
        Err(MissaError::Exhausted { .. })
    ));
    assert_eq!(engine.events_for(bulk.id).unwrap().len(), 3);
}

#[test]
fn test_fourth_personal_in_month_exceeds_quota() {
    let engine = engine();
    let personal = engine
        .create_intention(NewIntention::personal("Own intention"))
        .unwrap();

    for day in [3, 10, 17] {
        engine.celebrate(personal.id, date(2024, 4, day), None).unwrap();
    }
    let fourth = engine.celebrate(personal.id, date(2024, 4, 24), None);
    assert!(matches!(
        fourth,
        Err(MissaError::QuotaExceeded {
            current_usage: 3,
            limit: 3,
            ..
        })
    ));

    // The next month starts fresh
    engine.celebrate(personal.id, date(2024, 5, 1), None).unwrap();
}

#[test]
fn test_fixed_date_celebrated_once() {
    let engine = engine();
    let fixed = engine
        .create_intention(NewIntention::fixed_date(
            "Anniversary of death",
            IntentionSource::Individual,
            date(2024, 9, 14),
        ))
        .unwrap();

    engine.celebrate(fixed.id, date(2024, 9, 14), None).unwrap();
    assert!(matches!(
        engine.celebrate(fixed.id, date(2024, 9, 15), None),
        Err(MissaError::AlreadyFulfilled { .. })
    ));

    assert_eq!(engine.events_for(fixed.id).unwrap().len(), 1);
    let stored = engine.get_intention(fixed.id).unwrap();
    assert!(matches!(
        stored.state,
        IntentionState::FixedDate {
            is_celebrated: true,
            celebrated_on: Some(d),
            ..
        } if d == date(2024, 9, 14)
    ));
}

#[test]
fn test_bulk_projection_scenario() {
    let engine = engine();
    let bulk = engine
        .create_intention(NewIntention::bulk("Gregorian series", IntentionSource::Province, 10, date(2024, 1, 1)))
        .unwrap();

    for d in [date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)] {
        engine.celebrate(bulk.id, d, None).unwrap();
    }
    assert_eq!(remaining(&engine, bulk.id), 7);
    assert_eq!(
        engine.estimate(bulk.id).unwrap(),
        Some(date(2024, 1, 15) + Duration::days(7 * 7))
    );

    engine.toggle_bulk_pause(bulk.id).unwrap();
    assert_eq!(engine.estimate(bulk.id).unwrap(), None);
    assert!(matches!(
        engine.celebrate(bulk.id, date(2024, 1, 22), None),
        Err(MissaError::Paused { .. })
    ));

    engine.toggle_bulk_pause(bulk.id).unwrap();
    assert_eq!(
        engine.estimate(bulk.id).unwrap(),
        Some(date(2024, 1, 15) + Duration::days(7 * 7))
    );

    engine.celebrate(bulk.id, date(2024, 1, 22), None).unwrap();
    engine.celebrate(bulk.id, date(2024, 1, 29), None).unwrap();
    assert_eq!(remaining(&engine, bulk.id), 5);
    assert_eq!(
        engine.estimate(bulk.id).unwrap(),
        Some(date(2024, 1, 29) + Duration::days(5 * 7))
    );
}

#[test]
fn test_estimate_rejects_non_bulk() {
    let engine = engine();
    let special = engine
        .create_intention(NewIntention::special("Thanksgiving", IntentionSource::Individual))
        .unwrap();
    assert!(matches!(
        engine.estimate(special.id),
        Err(MissaError::Validation { .. })
    ));
}

#[test]
fn test_concurrent_decrements_one_wins() {
    let store = Arc::new(SqliteIntentionStore::in_memory().unwrap());
    let bulk = store
        .create(NewIntention::bulk("Series", IntentionSource::Province, 5, date(2024, 1, 1)))
        .unwrap();

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                store.apply_mutation(
                    bulk.id,
                    Mutation::DecrementBulk {
                        expected_remaining: 5,
                        celebrated_on: date(2024, 1, 2 + i),
                    },
                )
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(e) if e.is_retryable())));
    let stored = store.get(bulk.id).unwrap().unwrap();
    assert!(matches!(
        stored.state,
        IntentionState::Bulk {
            remaining_masses: 4,
            ..
        }
    ));
}

#[test]
fn test_active_intentions_exclude_finished() {
    let engine = engine();
    let fixed = engine
        .create_intention(NewIntention::fixed_date("Wedding", IntentionSource::Individual, date(2024, 5, 4)))
        .unwrap();
    engine
        .create_intention(NewIntention::personal("Own intention"))
        .unwrap();
    engine.celebrate(fixed.id, date(2024, 5, 4), None).unwrap();

    let active = engine.active_intentions().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind(), IntentionKind::Personal);

    let fixed_only = engine
        .list_intentions(&IntentionFilter::all().kind(IntentionKind::FixedDate))
        .unwrap();
    assert_eq!(fixed_only.len(), 1);
}

#[test]
fn test_priority_pause_option() {
    let config = EngineConfig::builder()
        .pause_bulk_on_priority_celebration(true)
        .build();
    let engine = IntentionEngine::in_memory(config, HolderId::new("fr-anselm").unwrap()).unwrap();
    let bulk = engine
        .create_intention(NewIntention::bulk("Series", IntentionSource::Province, 5, date(2024, 1, 1)))
        .unwrap();
    let personal = engine
        .create_intention(NewIntention::personal("Own intention"))
        .unwrap();

    engine.celebrate(personal.id, date(2024, 1, 2), None).unwrap();

    assert_eq!(engine.estimate(bulk.id).unwrap(), None);
    assert!(matches!(
        engine.celebrate(bulk.id, date(2024, 1, 3), None),
        Err(MissaError::Paused { .. })
    ));
}

#[test]
fn test_dashboard_reflects_recorded_state() {
    let engine = engine();
    let personal = engine
        .create_intention(NewIntention::personal("Own intention"))
        .unwrap();
    let overdue = engine
        .create_intention(NewIntention::fixed_date("Missed", IntentionSource::Province, date(2024, 3, 1)))
        .unwrap();
    let bulk = engine
        .create_intention(NewIntention::bulk("Series", IntentionSource::Province, 2, date(2024, 3, 1)))
        .unwrap();

    let as_of = date(2024, 3, 10);
    engine.celebrate(personal.id, as_of, None).unwrap();
    engine.celebrate(bulk.id, date(2024, 3, 2), None).unwrap();
    engine.celebrate(bulk.id, date(2024, 3, 3), None).unwrap();

    let snapshot = engine.dashboard(as_of, None).unwrap();
    assert_eq!(snapshot.today.personal_celebrations, 1);
    assert_eq!(snapshot.personal_this_month.count, 1);
    assert!(snapshot.bulk.is_empty());

    let overdue_ids: Vec<_> = snapshot
        .alerts_of(AlertKind::FixedDateOverdue)
        .filter_map(|a| a.intention_id)
        .collect();
    assert_eq!(overdue_ids, vec![overdue.id]);
    let completed: Vec<_> = snapshot
        .alerts_of(AlertKind::BulkCompleted)
        .filter_map(|a| a.intention_id)
        .collect();
    assert_eq!(completed, vec![bulk.id]);
}

#[test]
fn test_huge_bulk_has_no_estimate_and_dashboard_still_renders() {
    let engine = engine();
    let bulk = engine
        .create_intention(NewIntention::bulk(
            "Perpetual series",
            IntentionSource::Generalate,
            u32::MAX,
            date(2024, 1, 1),
        ))
        .unwrap();
    engine.celebrate(bulk.id, date(2024, 1, 1), None).unwrap();
    engine.celebrate(bulk.id, date(2024, 2, 1), None).unwrap();

    assert_eq!(engine.estimate(bulk.id).unwrap(), None);
    let snapshot = engine.dashboard(date(2024, 2, 2), None).unwrap();
    assert_eq!(snapshot.bulk.len(), 1);
    assert_eq!(snapshot.bulk[0].estimated_end, None);
}

#[test]
fn test_celebrate_returns_committed_state() {
    let engine = engine();
    let bulk = engine
        .create_intention(NewIntention::bulk("Series", IntentionSource::Province, 4, date(2024, 1, 1)))
        .unwrap();

    let committed = engine.celebrate(bulk.id, date(2024, 1, 2), None).unwrap();
    assert_eq!(committed.event.intention_id, bulk.id);
    assert_eq!(committed.intention.version, bulk.version + 1);
    assert!(matches!(
        committed.intention.state,
        IntentionState::Bulk {
            remaining_masses: 3,
            ..
        }
    ));
    assert_eq!(committed.intention, engine.get_intention(bulk.id).unwrap());
    assert!(committed.also_changed.is_empty());
}
