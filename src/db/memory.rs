// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store of record.
//!
//! Used for offline development and tests. Rows are keyed exactly like the
//! Firestore documents, so upserts overwrite on the natural key. Fetch and
//! write counters let callers assert how many round trips were made, and
//! the store can be switched offline to simulate network loss.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::db::{sort_set_records, SessionGateway};
use crate::error::{AppError, Result};
use crate::models::{
    resolve_duration, Baseline, Exercise, ExerciseId, Owner, Routine, RoutineId, SessionDetail,
    SessionId, SessionRecord, SetKey, SetPatch, SetRecord, SetValues, TrackingKind,
};

/// Catalog used when running offline.
const STARTER_EXERCISES: &[&str] = &[
    "Australian Pull-ups",
    "Bicep Curls",
    "Bicycle Crunches",
    "Bulgarian Split Squats",
    "Curtsy Lunges",
    "Dead Bugs",
    "Dead Hang",
    "Dumbbell Rows",
    "Goblet Squats",
    "Lateral Band Walks",
    "Negative Pull-ups",
    "Plank",
    "Push-up Hold",
    "Push-ups",
    "Reverse Lunges",
    "Romanian Deadlift (RDL)",
    "Scapula Pulls",
    "Single-leg Dumbbell Hip Thrust",
    "Single-leg Glute Bridges",
    "Squats",
    "Step-ups",
    "Walking Lunges",
    "Wall Sit",
];

/// Holds measured in seconds rather than repetitions.
const TIMED_EXERCISES: &[&str] = &["Plank", "Dead Hang", "Wall Sit", "Push-up Hold"];

/// Starter catalog with stable ids in alphabetical order.
pub fn starter_catalog() -> Vec<Exercise> {
    STARTER_EXERCISES
        .iter()
        .zip(1u64..)
        .map(|(name, id)| Exercise {
            id,
            name: name.to_string(),
            tracking: if TIMED_EXERCISES.contains(name) {
                TrackingKind::Duration
            } else {
                TrackingKind::Reps
            },
        })
        .collect()
}

#[derive(Default)]
struct Inner {
    sessions: DashMap<String, SessionRecord>,
    /// Keyed by `SetKey::document_id()`
    sets: DashMap<String, SetRecord>,
    exercises: DashMap<ExerciseId, Exercise>,
    routines: DashMap<RoutineId, Routine>,
    offline: AtomicBool,
    detail_fetches: AtomicU64,
    stats_fetches: AtomicU64,
    set_writes: AtomicU64,
}

/// Shared in-memory store; clones see the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a small exercise catalog.
    pub fn with_catalog(exercises: impl IntoIterator<Item = Exercise>) -> Self {
        let store = Self::new();
        for exercise in exercises {
            store.insert_exercise(exercise);
        }
        store
    }

    pub fn insert_exercise(&self, exercise: Exercise) {
        self.inner.exercises.insert(exercise.id, exercise);
    }

    pub fn insert_routine(&self, routine: Routine) {
        self.inner.routines.insert(routine.id, routine);
    }

    /// Seed a historical row (e.g. from an earlier session).
    pub fn insert_set_record(&self, record: SetRecord) {
        self.inner.sets.insert(record.key().document_id(), record);
    }

    /// Simulate losing (or regaining) the network.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn session(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.inner
            .sessions
            .get(session_id.as_str())
            .map(|s| s.value().clone())
    }

    /// All rows for a session, ordered by creation then set number.
    pub fn sets_for_session(&self, session_id: &SessionId) -> Vec<SetRecord> {
        let mut rows: Vec<SetRecord> = self
            .inner
            .sets
            .iter()
            .filter(|r| &r.session_id == session_id)
            .map(|r| r.value().clone())
            .collect();
        sort_set_records(&mut rows);
        rows
    }

    /// Rows matching a natural key. The store never holds more than one.
    pub fn rows_for_key(&self, key: &SetKey) -> Vec<SetRecord> {
        self.inner
            .sets
            .iter()
            .filter(|r| &r.value().key() == key)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn detail_fetch_count(&self) -> u64 {
        self.inner.detail_fetches.load(Ordering::SeqCst)
    }

    pub fn stats_fetch_count(&self) -> u64 {
        self.inner.stats_fetches.load(Ordering::SeqCst)
    }

    pub fn set_write_count(&self) -> u64 {
        self.inner.set_writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(AppError::Database("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionGateway for InMemoryStore {
    async fn create_session(
        &self,
        owner: &Owner,
        routine: Option<RoutineId>,
    ) -> Result<SessionRecord> {
        self.check_online()?;

        let now = Utc::now();
        let record = SessionRecord {
            id: SessionId::generate(),
            owner: owner.clone(),
            started_at: now,
            ended_at: None,
            duration_secs: None,
            notes: routine.map(|_| "Started from Routine".to_string()),
        };
        self.inner
            .sessions
            .insert(record.id.as_str().to_string(), record.clone());

        if let Some(routine_id) = routine {
            let routine = self
                .inner
                .routines
                .get(&routine_id)
                .map(|r| r.value().clone())
                .filter(|r| &r.owner == owner);

            match routine {
                Some(routine) => {
                    for row in routine.seed_sets(&record.id, now) {
                        self.insert_set_record(row);
                    }
                }
                None => {
                    tracing::warn!(routine_id, "Routine not found, starting empty session");
                }
            }
        }

        Ok(record)
    }

    async fn fetch_session_detail(
        &self,
        owner: &Owner,
        session_id: &SessionId,
    ) -> Result<Option<SessionDetail>> {
        self.check_online()?;
        self.inner.detail_fetches.fetch_add(1, Ordering::SeqCst);

        let Some(session) = self.session(session_id).filter(|s| &s.owner == owner) else {
            return Ok(None);
        };

        let sets = self
            .sets_for_session(session_id)
            .into_iter()
            .filter(|r| &r.owner == owner)
            .collect();

        Ok(Some(SessionDetail { session, sets }))
    }

    async fn fetch_previous_stats(
        &self,
        owner: &Owner,
        exercise_id: ExerciseId,
    ) -> Result<Option<Baseline>> {
        self.check_online()?;
        self.inner.stats_fetches.fetch_add(1, Ordering::SeqCst);

        let latest = self
            .inner
            .sets
            .iter()
            .filter(|r| &r.owner == owner && r.exercise_id == exercise_id && r.completed)
            .max_by_key(|r| r.updated_at)
            .map(|r| Baseline {
                weight: r.weight,
                reps: r.reps,
            });

        Ok(latest)
    }

    async fn upsert_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        exercise: &Exercise,
        values: &SetValues,
    ) -> Result<()> {
        self.check_online()?;
        self.inner.set_writes.fetch_add(1, Ordering::SeqCst);

        let now = Utc::now();
        let doc_id = key.document_id();

        // Entry API keeps the read-and-replace atomic per key.
        let mut entry = self
            .inner
            .sets
            .entry(doc_id)
            .or_insert_with(|| SetRecord {
                owner: owner.clone(),
                session_id: key.session_id.clone(),
                exercise_id: key.exercise_id,
                exercise_name: exercise.name.clone(),
                tracking: exercise.tracking,
                set_number: key.set_number,
                weight: None,
                reps: None,
                completed: false,
                note: None,
                created_at: now,
                updated_at: now,
            });

        if &entry.owner != owner {
            return Err(AppError::NotFound(format!("set {}", key.document_id())));
        }

        let row = entry.value_mut();
        row.exercise_name = exercise.name.clone();
        row.tracking = exercise.tracking;
        row.weight = Some(values.weight);
        row.reps = Some(values.reps);
        row.completed = values.completed;
        row.note = values.note.clone();
        row.updated_at = now;

        Ok(())
    }

    async fn patch_set(&self, owner: &Owner, key: &SetKey, patch: &SetPatch) -> Result<bool> {
        self.check_online()?;
        self.inner.set_writes.fetch_add(1, Ordering::SeqCst);

        match self.inner.sets.get_mut(&key.document_id()) {
            Some(mut row) if &row.owner == owner => {
                row.apply_patch(patch, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_session(
        &self,
        owner: &Owner,
        session_id: &SessionId,
        duration_secs: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        self.check_online()?;

        let mut session = self
            .inner
            .sessions
            .get_mut(session_id.as_str())
            .filter(|s| &s.owner == owner)
            .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))?;

        session.duration_secs = Some(resolve_duration(
            duration_secs,
            session.started_at,
            ended_at,
        ));
        session.ended_at = Some(ended_at);

        Ok(session.clone())
    }

    async fn fetch_exercises(&self) -> Result<Vec<Exercise>> {
        self.check_online()?;

        let mut exercises: Vec<Exercise> = self
            .inner
            .exercises
            .iter()
            .map(|e| e.value().clone())
            .collect();
        exercises.sort_by_key(|e| e.id);
        Ok(exercises)
    }
}
