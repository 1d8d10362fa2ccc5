// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rest countdown routes.

use crate::db::SessionGateway;
use crate::error::{AppError, Result};
use crate::services::RestStatus;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Longest accepted rest target (one hour).
const MAX_REST_TARGET_SECS: u64 = 3600;

pub fn routes<G: SessionGateway>() -> Router<Arc<AppState<G>>> {
    Router::new()
        .route("/api/rest", get(get_rest::<G>))
        .route("/api/rest/increment", post(increment::<G>))
        .route("/api/rest/decrement", post(decrement::<G>))
        .route("/api/rest/skip", post(skip::<G>))
        .route("/api/rest/target", put(set_target::<G>))
}

#[derive(Deserialize)]
pub struct RestTargetRequest {
    pub target_secs: u64,
}

async fn get_rest<G: SessionGateway>(State(state): State<Arc<AppState<G>>>) -> Json<RestStatus> {
    Json(state.controller.lock().await.rest_status())
}

async fn increment<G: SessionGateway>(State(state): State<Arc<AppState<G>>>) -> Json<RestStatus> {
    Json(state.controller.lock().await.rest_increment())
}

async fn decrement<G: SessionGateway>(State(state): State<Arc<AppState<G>>>) -> Json<RestStatus> {
    Json(state.controller.lock().await.rest_decrement())
}

async fn skip<G: SessionGateway>(State(state): State<Arc<AppState<G>>>) -> Json<RestStatus> {
    Json(state.controller.lock().await.rest_skip())
}

async fn set_target<G: SessionGateway>(
    State(state): State<Arc<AppState<G>>>,
    Json(req): Json<RestTargetRequest>,
) -> Result<Json<RestStatus>> {
    if req.target_secs == 0 || req.target_secs > MAX_REST_TARGET_SECS {
        return Err(AppError::BadRequest(format!(
            "target_secs must be between 1 and {}",
            MAX_REST_TARGET_SECS
        )));
    }

    tracing::debug!(target_secs = req.target_secs, "Rest target changed");
    Ok(Json(
        state.controller.lock().await.set_rest_target(req.target_secs),
    ))
}
