// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, TimeZone, Utc};
use ironpath_session::config::Config;
use ironpath_session::db::{FirestoreDb, InMemoryStore, SessionGateway};
use ironpath_session::error::Result;
use ironpath_session::models::{
    Baseline, Exercise, ExerciseId, Owner, RoutineId, SessionDetail, SessionId, SessionRecord,
    SetKey, SetPatch, SetValues, TrackingKind,
};
use ironpath_session::routes::create_router;
use ironpath_session::services::{ManualClock, RestTimer, SessionCache, SessionController};
use ironpath_session::AppState;
use std::sync::Arc;
use tokio::sync::Notify;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn owner() -> Owner {
    Owner::new("test-owner").unwrap()
}

#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn bench_press() -> Exercise {
    Exercise {
        id: 1,
        name: "Bench Press".to_string(),
        tracking: TrackingKind::Reps,
    }
}

#[allow(dead_code)]
pub fn plank() -> Exercise {
    Exercise {
        id: 2,
        name: "Plank".to_string(),
        tracking: TrackingKind::Duration,
    }
}

/// In-memory store with a two-exercise catalog.
#[allow(dead_code)]
pub fn test_store() -> InMemoryStore {
    InMemoryStore::with_catalog([bench_press(), plank()])
}

/// Controller over `store` with a hand-driven clock and its own cache dir.
#[allow(dead_code)]
pub fn test_controller(
    store: &InMemoryStore,
    clock: Arc<ManualClock>,
    cache_dir: &tempfile::TempDir,
) -> SessionController<InMemoryStore> {
    SessionController::new(
        Arc::new(store.clone()),
        Some(owner()),
        SessionCache::open(cache_dir.path()),
        clock,
        RestTimer::new(60, 30),
    )
}

/// Create a test app over an in-memory store.
/// Returns the router, the shared state, the store and the cache dir guard.
#[allow(dead_code)]
pub fn create_test_app() -> (
    axum::Router,
    Arc<AppState<InMemoryStore>>,
    InMemoryStore,
    tempfile::TempDir,
) {
    let store = test_store();
    let (app, state, dir) = create_app_with(store.clone());
    (app, state, store, dir)
}

/// Create a test app over any gateway, with its own cache dir.
#[allow(dead_code)]
pub fn create_app_with<G: SessionGateway>(
    gateway: G,
) -> (axum::Router, Arc<AppState<G>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::test_default()
    };

    let state = AppState::bootstrap(config, Arc::new(gateway));
    (create_router(state.clone()), state, dir)
}

/// In-memory store whose previous-stats lookup parks until released.
#[allow(dead_code)]
#[derive(Clone)]
pub struct StallingStore {
    pub inner: InMemoryStore,
    /// Notified when a lookup starts waiting
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[allow(dead_code)]
impl StallingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

impl SessionGateway for StallingStore {
    async fn create_session(
        &self,
        owner: &Owner,
        routine: Option<RoutineId>,
    ) -> Result<SessionRecord> {
        self.inner.create_session(owner, routine).await
    }

    async fn fetch_session_detail(
        &self,
        owner: &Owner,
        session_id: &SessionId,
    ) -> Result<Option<SessionDetail>> {
        self.inner.fetch_session_detail(owner, session_id).await
    }

    async fn fetch_previous_stats(
        &self,
        owner: &Owner,
        exercise_id: ExerciseId,
    ) -> Result<Option<Baseline>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.fetch_previous_stats(owner, exercise_id).await
    }

    async fn upsert_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        exercise: &Exercise,
        values: &SetValues,
    ) -> Result<()> {
        self.inner.upsert_set(owner, key, exercise, values).await
    }

    async fn patch_set(&self, owner: &Owner, key: &SetKey, patch: &SetPatch) -> Result<bool> {
        self.inner.patch_set(owner, key, patch).await
    }

    async fn finish_session(
        &self,
        owner: &Owner,
        session_id: &SessionId,
        duration_secs: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        self.inner
            .finish_session(owner, session_id, duration_secs, ended_at)
            .await
    }

    async fn fetch_exercises(&self) -> Result<Vec<Exercise>> {
        self.inner.fetch_exercises().await
    }
}
