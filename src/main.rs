// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! IronPath Session Server
//!
//! Runs the active-workout engine on the device and serves the JSON API
//! the UI shell talks to.

use ironpath_session::{
    config::Config,
    db::{starter_catalog, FirestoreDb, InMemoryStore, SessionGateway},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        offline = config.offline,
        data_dir = %config.data_dir.display(),
        "Starting IronPath session server"
    );

    if config.offline {
        tracing::warn!("Offline mode: using in-memory store, nothing is persisted remotely");
        let store = InMemoryStore::with_catalog(starter_catalog());
        serve(config, Arc::new(store)).await
    } else {
        let db = FirestoreDb::new(&config.gcp_project_id).await?;
        serve(config, Arc::new(db)).await
    }
}

async fn serve<G: SessionGateway>(
    config: Config,
    gateway: Arc<G>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let state = AppState::bootstrap(config, gateway);

    // Build router
    let app = ironpath_session::routes::create_router(state);

    // Bind locally only; the API serves this device's UI.
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(
            "ironpath_session=debug"
                .parse()
                .unwrap_or_else(|_| tracing::Level::DEBUG.into()),
        )
        .add_directive(tracing::Level::INFO.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
