// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: lifecycle and set editing.
//!
//! Mutations return the fresh snapshot so the UI can re-render from one
//! response. Handlers that reach the remote store drop the controller lock
//! for the duration of the call.

use crate::db::SessionGateway;
use crate::error::Result;
use crate::models::{Exercise, ExerciseId, RoutineId, SessionId, SessionRecord};
use crate::services::{Prepared, SessionSnapshot, SessionState, SetField};
use crate::time_utils::{format_elapsed, format_utc_rfc3339};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes<G: SessionGateway>() -> Router<Arc<AppState<G>>> {
    Router::new()
        .route("/api/exercises", get(get_exercises::<G>))
        .route("/api/session", get(get_session::<G>))
        .route("/api/session/elapsed", get(get_elapsed::<G>))
        .route("/api/session/start", post(start_session::<G>))
        .route("/api/session/resume/{id}", post(resume_session::<G>))
        .route("/api/session/finish", post(finish_session::<G>))
        .route("/api/session/exercises", post(add_exercise::<G>))
        .route("/api/session/exercises/{ex}/sets", post(add_set::<G>))
        .route(
            "/api/session/exercises/{ex}/sets/{set}/weight",
            put(update_weight::<G>),
        )
        .route(
            "/api/session/exercises/{ex}/sets/{set}/reps",
            put(update_reps::<G>),
        )
        .route(
            "/api/session/exercises/{ex}/sets/{set}/note",
            put(set_note::<G>),
        )
        .route(
            "/api/session/exercises/{ex}/sets/{set}/toggle",
            post(toggle_completion::<G>),
        )
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Deserialize, Default)]
pub struct StartRequest {
    #[serde(default)]
    pub routine_id: Option<RoutineId>,
}

#[derive(Deserialize)]
pub struct AddExerciseRequest {
    pub exercise_id: ExerciseId,
}

/// Raw text for a weight or reps field; normalized only on remote write.
#[derive(Deserialize)]
pub struct ValueRequest {
    pub value: String,
}

#[derive(Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Serialize)]
pub struct ElapsedResponse {
    pub state: SessionState,
    pub elapsed_secs: u64,
    pub display: String,
}

#[derive(Serialize)]
pub struct FinishResponse {
    pub session_id: SessionId,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_secs: Option<u64>,
    pub duration_display: String,
}

impl From<SessionRecord> for FinishResponse {
    fn from(record: SessionRecord) -> Self {
        let duration = record.duration_secs.unwrap_or(0);
        Self {
            session_id: record.id,
            started_at: format_utc_rfc3339(record.started_at),
            ended_at: record.ended_at.map(format_utc_rfc3339),
            duration_secs: record.duration_secs,
            duration_display: format_elapsed(duration),
        }
    }
}

// ─── Read Side ───────────────────────────────────────────────

async fn get_exercises<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
) -> Result<Json<Vec<Exercise>>> {
    Ok(Json(load_catalog(&state).await?))
}

async fn get_session<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<SessionSnapshot> {
    Json(state.controller.lock().await.snapshot())
}

/// Latest values published by the controller and ticker; never takes the
/// controller lock.
async fn get_elapsed<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<ElapsedResponse> {
    let elapsed_secs = *state.elapsed.borrow();
    Json(ElapsedResponse {
        state: *state.session_state.borrow(),
        elapsed_secs,
        display: format_elapsed(elapsed_secs),
    })
}

async fn load_catalog<G: SessionGateway>(state: &Arc<AppState<G>>) -> Result<Vec<Exercise>> {
    let prepared = state.controller.lock().await.prepare_catalog();
    match prepared {
        Prepared::Ready(exercises) => Ok(exercises),
        Prepared::Remote(fetch) => {
            let fetched = fetch.run().await;
            state.controller.lock().await.complete_catalog(fetched)
        }
    }
}

// ─── Lifecycle ───────────────────────────────────────────────

async fn start_session<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<SessionSnapshot>> {
    let fetch = state.controller.lock().await.prepare_start(req.routine_id)?;
    let fetched = fetch.run().await;

    let mut controller = state.controller.lock().await;
    controller.complete_start(fetched)?;
    Ok(Json(controller.snapshot()))
}

async fn resume_session<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>> {
    let prepared = state
        .controller
        .lock()
        .await
        .prepare_resume(&SessionId::new(id))?;

    let mut controller = match prepared {
        Prepared::Ready(()) => state.controller.lock().await,
        Prepared::Remote(fetch) => {
            let fetched = fetch.run().await;
            let mut controller = state.controller.lock().await;
            controller.complete_resume(fetched)?;
            controller
        }
    };
    Ok(Json(controller.snapshot()))
}

async fn finish_session<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
) -> Result<Json<FinishResponse>> {
    let call = state.controller.lock().await.prepare_finish()?;
    let fetched = call.run().await;

    let record = state.controller.lock().await.complete_finish(fetched)?;
    Ok(Json(record.into()))
}

// ─── Set Ledger ──────────────────────────────────────────────

/// Add an exercise, then fetch its previous-performance baseline. The
/// exercise is visible to other requests while the baseline is in flight.
async fn add_exercise<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Json(req): Json<AddExerciseRequest>,
) -> Result<Json<SessionSnapshot>> {
    load_catalog(&state).await?;

    let prepared = {
        let mut controller = state.controller.lock().await;
        let index = controller.insert_exercise(req.exercise_id)?;
        controller.prepare_baseline(index)?
    };

    let mut controller = match prepared {
        Prepared::Ready(_) => state.controller.lock().await,
        Prepared::Remote(fetch) => {
            let fetched = fetch.run().await;
            let mut controller = state.controller.lock().await;
            controller.complete_baseline(fetched)?;
            controller
        }
    };
    Ok(Json(controller.snapshot()))
}

async fn add_set<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path(ex): Path<usize>,
) -> Result<Json<SessionSnapshot>> {
    let mut controller = state.controller.lock().await;
    controller.add_set(ex)?;
    Ok(Json(controller.snapshot()))
}

async fn update_weight<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path((ex, set)): Path<(usize, usize)>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<SessionSnapshot>> {
    edit(&state, ex, set, SetField::Weight, &req.value).await
}

async fn update_reps<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path((ex, set)): Path<(usize, usize)>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<SessionSnapshot>> {
    edit(&state, ex, set, SetField::Reps, &req.value).await
}

async fn edit<G: SessionGateway>(
    state: &Arc<AppState<G>>,
    ex: usize,
    set: usize,
    field: SetField,
    value: &str,
) -> Result<Json<SessionSnapshot>> {
    let mut controller = state.controller.lock().await;
    controller.edit_value(ex, set, field, value)?;
    Ok(Json(controller.snapshot()))
}

async fn set_note<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path((ex, set)): Path<(usize, usize)>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<SessionSnapshot>> {
    let mut controller = state.controller.lock().await;
    controller.set_note(ex, set, &req.note)?;
    Ok(Json(controller.snapshot()))
}

async fn toggle_completion<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Path((ex, set)): Path<(usize, usize)>,
) -> Result<Json<SessionSnapshot>> {
    let mut controller = state.controller.lock().await;
    let completed = controller.toggle_completion(ex, set)?;
    tracing::debug!(exercise_index = ex, set_index = set, completed, "Set toggled");
    Ok(Json(controller.snapshot()))
}
