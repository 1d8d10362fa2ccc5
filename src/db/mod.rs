// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote session gateway: the narrow set of calls made to the store of record.
//!
//! Every call is scoped by an [`Owner`]. Futures are `Send` so set writes
//! can be spawned and left to finish in the background.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::{starter_catalog, InMemoryStore};

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::Result;
use crate::models::{
    Baseline, Exercise, ExerciseId, Owner, RoutineId, SessionDetail, SessionId, SessionRecord,
    SetKey, SetPatch, SetValues,
};

/// Collection names as constants.
pub mod collections {
    pub const WORKOUT_SESSIONS: &str = "workout_sessions";
    /// Set rows, document ID derived from the natural key
    pub const SETS: &str = "sets";
    pub const EXERCISES: &str = "exercises";
    pub const ROUTINES: &str = "routines";
}

/// Operations the session engine consumes from the persistence service.
pub trait SessionGateway: Send + Sync + 'static {
    /// Create a session starting now, optionally seeded from a routine.
    fn create_session(
        &self,
        owner: &Owner,
        routine: Option<RoutineId>,
    ) -> impl Future<Output = Result<SessionRecord>> + Send;

    /// Fetch a session and all of its sets; `None` if absent or not owned.
    fn fetch_session_detail(
        &self,
        owner: &Owner,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionDetail>>> + Send;

    /// Most recent completed set for an exercise across the owner's sessions.
    fn fetch_previous_stats(
        &self,
        owner: &Owner,
        exercise_id: ExerciseId,
    ) -> impl Future<Output = Result<Option<Baseline>>> + Send;

    /// Insert or overwrite the row for `key`. Repeating the call leaves one row.
    fn upsert_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        exercise: &Exercise,
        values: &SetValues,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Update the present fields of an existing row.
    ///
    /// Returns `false` without writing when the row does not exist.
    fn patch_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        patch: &SetPatch,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Record end instant and duration.
    fn finish_session(
        &self,
        owner: &Owner,
        session_id: &SessionId,
        duration_secs: u64,
        ended_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<SessionRecord>> + Send;

    /// Exercise catalog.
    fn fetch_exercises(&self) -> impl Future<Output = Result<Vec<Exercise>>> + Send;
}

/// Order rows by creation, then set number.
pub(crate) fn sort_set_records(sets: &mut [crate::models::SetRecord]) {
    sets.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.set_number.cmp(&b.set_number))
    });
}
