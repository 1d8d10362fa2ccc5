// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end scenarios for the session controller over the in-memory store.

use chrono::Duration;
use ironpath_session::db::SessionGateway;
use ironpath_session::error::AppError;
use ironpath_session::models::{
    Baseline, Owner, PlannedExercise, Routine, SessionId, SetKey, SetValues, TrackingKind,
};
use ironpath_session::services::{
    ManualClock, RestTimer, SessionCache, SessionController, SessionState, SyncState,
};
use std::sync::Arc;

mod common;
use common::{bench_press, owner, plank, t0, test_controller, test_store};

// ═══════════════════════════════════════════════════════════════════════════
// SET WRITES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_toggle_writes_exactly_one_row_per_key() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let session_id = ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();
    ctl.update_weight(ex, 0, "40").unwrap();
    ctl.update_reps(ex, 0, "8").unwrap();

    assert!(ctl.toggle_completion(ex, 0).unwrap());
    ctl.settle().await;

    let key = SetKey::new(session_id.clone(), bench_press().id, 1);
    let rows = store.rows_for_key(&key);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].weight, Some(40.0));
    assert_eq!(rows[0].reps, Some(8));
    assert!(rows[0].completed);
    assert_eq!(ctl.exercises()[ex].sets[0].sync, SyncState::Synced);

    // Toggle off (local only), edit, toggle on again.
    assert!(!ctl.toggle_completion(ex, 0).unwrap());
    ctl.update_weight(ex, 0, "42.5").unwrap();
    assert!(ctl.toggle_completion(ex, 0).unwrap());
    ctl.settle().await;

    let rows = store.rows_for_key(&key);
    assert_eq!(rows.len(), 1, "re-completing must overwrite, never duplicate");
    assert_eq!(rows[0].weight, Some(42.5));
    assert_eq!(store.sets_for_session(&session_id).len(), 1);
}

#[tokio::test]
async fn test_uncompleting_issues_no_remote_write() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();
    ctl.toggle_completion(ex, 0).unwrap();
    ctl.settle().await;
    let writes = store.set_write_count();

    ctl.toggle_completion(ex, 0).unwrap();
    ctl.settle().await;

    assert_eq!(store.set_write_count(), writes);
    assert!(!ctl.exercises()[ex].sets[0].completed);
}

#[tokio::test]
async fn test_duration_sets_are_normalized_before_write() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let session_id = ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(plank().id).await.unwrap();
    ctl.update_reps(ex, 0, "1:30").unwrap();
    ctl.update_weight(ex, 0, "abc").unwrap();
    ctl.toggle_completion(ex, 0).unwrap();
    ctl.settle().await;

    let rows = store.rows_for_key(&SetKey::new(session_id, plank().id, 1));
    assert_eq!(rows[0].reps, Some(90));
    assert_eq!(rows[0].weight, Some(0.0));
    assert_eq!(rows[0].tracking, TrackingKind::Duration);
}

#[tokio::test]
async fn test_failed_write_keeps_optimistic_state() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let session_id = ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();

    store.set_offline(true);
    assert!(ctl.toggle_completion(ex, 0).unwrap());
    assert_eq!(ctl.exercises()[ex].sets[0].sync, SyncState::Pending);
    ctl.settle().await;

    let set = &ctl.exercises()[ex].sets[0];
    assert!(set.completed, "local state is not rolled back");
    assert_eq!(set.sync, SyncState::Failed);
    assert!(store.sets_for_session(&session_id).is_empty());
    assert_eq!(ctl.state(), SessionState::Active);
}

#[tokio::test]
async fn test_note_patches_only_completed_sets() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let session_id = ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();

    ctl.set_note(ex, 0, "warmup").unwrap();
    ctl.settle().await;
    assert_eq!(store.set_write_count(), 0);
    assert_eq!(ctl.exercises()[ex].sets[0].note.as_deref(), Some("warmup"));

    ctl.toggle_completion(ex, 0).unwrap();
    ctl.set_note(ex, 0, "felt easy").unwrap();
    ctl.settle().await;

    let rows = store.rows_for_key(&SetKey::new(session_id, bench_press().id, 1));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].note.as_deref(), Some("felt easy"));
    assert!(rows[0].completed);
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTO-FILL
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_add_set_copies_previous_set() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();
    ctl.update_weight(ex, 0, "20").unwrap();
    ctl.update_reps(ex, 0, "10").unwrap();

    let set = ctl.add_set(ex).unwrap();

    let added = &ctl.exercises()[ex].sets[set];
    assert_eq!(added.set_number, 2);
    assert_eq!((added.weight.as_str(), added.reps.as_str()), ("20", "10"));
}

#[tokio::test]
async fn test_baseline_loaded_once_per_exercise() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();

    // A completed set from an earlier workout.
    let earlier = store.create_session(&owner(), None).await.unwrap();
    store
        .upsert_set(
            &owner(),
            &SetKey::new(earlier.id, bench_press().id, 1),
            &bench_press(),
            &SetValues {
                weight: 15.0,
                reps: 12,
                completed: true,
                note: None,
            },
        )
        .await
        .unwrap();

    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);
    ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();

    let expected = Baseline {
        weight: Some(15.0),
        reps: Some(12),
    };
    assert_eq!(ctl.load_baseline(ex).await.unwrap(), Some(expected));
    assert_eq!(ctl.load_baseline(ex).await.unwrap(), Some(expected));
    assert_eq!(store.stats_fetch_count(), 1);
    assert_eq!(ctl.exercises()[ex].baseline, Some(expected));
}

#[tokio::test]
async fn test_baseline_failure_reads_as_none() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    ctl.start(None).await.unwrap();
    let ex = ctl.add_exercise(bench_press().id).await.unwrap();

    store.set_offline(true);
    assert_eq!(ctl.load_baseline(ex).await.unwrap(), None);
    assert!(!ctl.exercises()[ex].baseline_loaded);
}

// ═══════════════════════════════════════════════════════════════════════════
// START / RESUME
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_start_from_routine_seeds_sets() {
    let store = test_store();
    store.insert_routine(Routine {
        id: 7,
        owner: owner(),
        name: "Monday - Strength A".to_string(),
        exercises: vec![
            PlannedExercise {
                exercise_id: plank().id,
                exercise_name: plank().name,
                tracking: TrackingKind::Duration,
                order: 2,
                target_sets: 3,
                target_reps: 45,
                target_weight: None,
            },
            PlannedExercise {
                exercise_id: bench_press().id,
                exercise_name: bench_press().name,
                tracking: TrackingKind::Reps,
                order: 1,
                target_sets: 2,
                target_reps: 10,
                target_weight: Some(20.0),
            },
        ],
    });
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    ctl.start(Some(7)).await.unwrap();

    let exercises = ctl.exercises();
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0].exercise.id, bench_press().id);
    assert_eq!(exercises[0].sets.len(), 2);
    assert_eq!(exercises[0].sets[1].weight, "20");
    assert_eq!(exercises[0].sets[1].reps, "10");
    assert_eq!(exercises[1].exercise.tracking, TrackingKind::Duration);
    assert_eq!(exercises[1].sets.len(), 3);
    assert!(exercises.iter().flat_map(|e| &e.sets).all(|s| !s.completed));
}

#[tokio::test]
async fn test_resume_same_session_is_noop() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let session = store.create_session(&owner(), None).await.unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    ctl.resume(&session.id).await.unwrap();
    let before = ctl.exercises().to_vec();
    ctl.resume(&session.id).await.unwrap();

    assert_eq!(store.detail_fetch_count(), 1);
    assert_eq!(ctl.exercises(), before.as_slice());
    assert_eq!(ctl.session_id(), Some(&session.id));
}

#[tokio::test]
async fn test_resume_anchors_to_remote_start() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let session = store.create_session(&owner(), None).await.unwrap();

    // Local clock is five minutes past the recorded start.
    let clock = Arc::new(ManualClock::new(session.started_at + Duration::seconds(300)));
    let mut ctl = test_controller(&store, clock.clone(), &dir);

    ctl.resume(&session.id).await.unwrap();
    assert_eq!(ctl.elapsed_secs(), 300);

    // Device asleep for ten seconds, no ticks observed.
    clock.advance(Duration::seconds(10));
    assert_eq!(ctl.elapsed_secs(), 310);
}

#[tokio::test]
async fn test_resume_groups_remote_sets_with_baselines() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();

    // Earlier workout provides a plank baseline.
    let earlier = store.create_session(&owner(), None).await.unwrap();
    store
        .upsert_set(
            &owner(),
            &SetKey::new(earlier.id, plank().id, 1),
            &plank(),
            &SetValues {
                weight: 0.0,
                reps: 60,
                completed: true,
                note: None,
            },
        )
        .await
        .unwrap();

    // Session to resume, written from another device.
    let session = store.create_session(&owner(), None).await.unwrap();
    for set_number in 1..=2 {
        store
            .upsert_set(
                &owner(),
                &SetKey::new(session.id.clone(), bench_press().id, set_number),
                &bench_press(),
                &SetValues {
                    weight: 50.0,
                    reps: 5,
                    completed: true,
                    note: None,
                },
            )
            .await
            .unwrap();
    }
    store
        .upsert_set(
            &owner(),
            &SetKey::new(session.id.clone(), plank().id, 1),
            &plank(),
            &SetValues {
                weight: 0.0,
                reps: 30,
                completed: false,
                note: Some("shaky".to_string()),
            },
        )
        .await
        .unwrap();

    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);
    ctl.resume(&session.id).await.unwrap();

    let exercises = ctl.exercises();
    assert_eq!(exercises.len(), 2);
    let bench = exercises
        .iter()
        .find(|e| e.exercise.id == bench_press().id)
        .unwrap();
    assert_eq!(bench.exercise.name, "Bench Press");
    assert_eq!(bench.sets.len(), 2);
    assert_eq!(bench.sets[0].weight, "50");
    assert!(bench.sets.iter().all(|s| s.sync == SyncState::Synced));

    let hold = exercises.iter().find(|e| e.exercise.id == plank().id).unwrap();
    assert_eq!(hold.sets[0].note.as_deref(), Some("shaky"));
    assert_eq!(hold.baseline.and_then(|b| b.reps), Some(60));
    // One baseline fetch per distinct exercise.
    assert_eq!(store.stats_fetch_count(), 2);
}

#[tokio::test]
async fn test_resume_unknown_session_drops_to_no_session() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);
    ctl.start(None).await.unwrap();

    let result = ctl.resume(&SessionId::new("does-not-exist")).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(ctl.state(), SessionState::NoSession);
    assert!(SessionCache::open(dir.path()).load().is_none());
}

#[tokio::test]
async fn test_start_failure_leaves_no_session() {
    let store = test_store();
    store.set_offline(true);
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let result = ctl.start(None).await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert_eq!(ctl.state(), SessionState::NoSession);
    assert!(ctl.session_id().is_none());
}

#[tokio::test]
async fn test_missing_owner_fails_before_remote_call() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = SessionController::new(
        Arc::new(store.clone()),
        Owner::resolve(None, Some("  ")),
        SessionCache::open(dir.path()),
        Arc::new(ManualClock::new(t0())),
        RestTimer::new(60, 30),
    );

    assert!(matches!(
        ctl.start(None).await,
        Err(AppError::Unauthorized)
    ));
    assert_eq!(ctl.state(), SessionState::NoSession);
    assert_eq!(store.detail_fetch_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// FINISH / CACHE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_finish_without_session_is_an_error() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    assert!(matches!(
        ctl.finish().await,
        Err(AppError::NoActiveSession)
    ));
}

#[tokio::test]
async fn test_finish_records_duration_and_clears_cache() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let mut ctl = test_controller(&store, clock.clone(), &dir);

    let session_id = ctl.start(None).await.unwrap();
    ctl.add_exercise(bench_press().id).await.unwrap();
    assert!(SessionCache::open(dir.path()).load().is_some());

    clock.advance(Duration::seconds(1800));
    let record = ctl.finish().await.unwrap();

    assert_eq!(record.duration_secs, Some(1800));
    assert!(record.ended_at.is_some());
    assert_eq!(store.session(&session_id).unwrap().duration_secs, Some(1800));
    assert_eq!(ctl.state(), SessionState::NoSession);
    assert!(ctl.exercises().is_empty());
    assert!(SessionCache::open(dir.path()).load().is_none());
}

#[tokio::test]
async fn test_failed_finish_keeps_session_active() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = test_controller(&store, Arc::new(ManualClock::new(t0())), &dir);

    let session_id = ctl.start(None).await.unwrap();
    store.set_offline(true);

    assert!(matches!(ctl.finish().await, Err(AppError::Database(_))));
    assert_eq!(ctl.state(), SessionState::Active);
    assert_eq!(ctl.session_id(), Some(&session_id));
    assert!(SessionCache::open(dir.path()).load().is_some());

    store.set_offline(false);
    assert!(ctl.finish().await.is_ok());
}

#[tokio::test]
async fn test_restore_from_cache_without_network() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));

    let session_id = {
        let mut ctl = test_controller(&store, clock.clone(), &dir);
        let id = ctl.start(None).await.unwrap();
        let ex = ctl.add_exercise(bench_press().id).await.unwrap();
        ctl.update_weight(ex, 0, "60").unwrap();
        ctl.add_set(ex).unwrap();
        id
    };

    // Process restarts two minutes later.
    clock.advance(Duration::seconds(120));
    let mut restored = test_controller(&store, clock, &dir);
    assert!(restored.restore_from_cache());

    assert_eq!(restored.state(), SessionState::Active);
    assert_eq!(restored.session_id(), Some(&session_id));
    assert_eq!(restored.exercises()[0].sets.len(), 2);
    assert_eq!(restored.exercises()[0].sets[1].weight, "60");
    assert_eq!(restored.elapsed_secs(), 120);
    assert_eq!(store.detail_fetch_count(), 0);

    // Resuming the cached session again does not hit the network.
    restored.resume(&session_id).await.unwrap();
    assert_eq!(store.detail_fetch_count(), 0);
}

#[tokio::test]
async fn test_restore_marks_unreported_writes_failed() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));

    {
        let mut ctl = test_controller(&store, clock.clone(), &dir);
        ctl.start(None).await.unwrap();
        let ex = ctl.add_exercise(bench_press().id).await.unwrap();
        store.set_offline(true);
        ctl.toggle_completion(ex, 0).unwrap();
        // Dropped before the outcome is observed.
    }

    let mut restored = test_controller(&store, clock, &dir);
    assert!(restored.restore_from_cache());
    assert_eq!(restored.exercises()[0].sets[0].sync, SyncState::Failed);
}

#[tokio::test]
async fn test_finish_on_stale_cached_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));

    let session_id = {
        let store = test_store();
        let mut ctl = test_controller(&store, clock.clone(), &dir);
        ctl.start(None).await.unwrap()
    };

    // The slot outlives the store that held its session.
    let store = test_store();
    let mut restored = test_controller(&store, clock, &dir);
    assert!(restored.restore_from_cache());

    assert!(matches!(restored.finish().await, Err(AppError::NotFound(_))));
    assert_eq!(restored.state(), SessionState::Active);
    assert_eq!(restored.session_id(), Some(&session_id));
}
