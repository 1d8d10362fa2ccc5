// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! IronPath session engine: the active-workout state machine
//!
//! This crate owns the running workout on a device. It keeps the set ledger
//! and elapsed clock, mirrors them into a local cache slot, writes completed
//! sets to the remote store of record, and serves a small JSON API for the
//! UI shell.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{FirestoreDb, SessionGateway};
use services::{spawn_ticker, SessionController, SessionState, SystemClock};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Shared application state.
pub struct AppState<G: SessionGateway = FirestoreDb> {
    pub config: Config,
    /// Sole mutator of session state. Handlers release it while waiting
    /// on the remote store.
    pub controller: Mutex<SessionController<G>>,
    /// Elapsed seconds, republished by the ticker
    pub elapsed: watch::Receiver<u64>,
    pub session_state: watch::Receiver<SessionState>,
}

impl<G: SessionGateway> AppState<G> {
    /// Wire a controller over `gateway`, restore any cached session and
    /// start the elapsed ticker. Must run inside a Tokio runtime.
    pub fn bootstrap(config: Config, gateway: Arc<G>) -> Arc<Self> {
        let mut controller = SessionController::from_config(gateway, &config);
        if controller.restore_from_cache() {
            tracing::info!("Resuming cached workout");
        }

        let (elapsed, _ticker) = spawn_ticker(
            Arc::new(SystemClock),
            controller.subscribe_anchor(),
            config.tick_interval,
        );

        let session_state = controller.subscribe_state();

        Arc::new(Self {
            config,
            controller: Mutex::new(controller),
            elapsed,
            session_state,
        })
    }
}
