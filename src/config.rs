// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local API port
    pub port: u16,
    /// UI origin allowed by CORS
    pub frontend_url: String,
    /// GCP project holding the Firestore store of record
    pub gcp_project_id: String,
    /// Use the in-memory gateway instead of Firestore
    pub offline: bool,
    /// Directory holding the single local session cache slot
    pub data_dir: PathBuf,
    /// Authenticated owner identity, if signed in
    pub owner_id: Option<String>,
    /// Guest identity used when nobody is signed in
    pub guest_id: Option<String>,
    /// Initial rest countdown in seconds
    pub rest_timer_secs: u64,
    /// Rest timer increment/decrement step in seconds
    pub rest_timer_step_secs: u64,
    /// Period at which elapsed time is republished
    pub tick_interval: Duration,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            offline: true,
            data_dir: PathBuf::from(".ironpath-test"),
            owner_id: Some("test-owner".to_string()),
            guest_id: None,
            rest_timer_secs: 60,
            rest_timer_step_secs: 30,
            tick_interval: Duration::from_millis(1000),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let offline = env::var("IRONPATH_OFFLINE")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let gcp_project_id = match env::var("GCP_PROJECT_ID") {
            Ok(id) => id,
            Err(_) if offline => "offline".to_string(),
            Err(_) => return Err(ConfigError::Missing("GCP_PROJECT_ID")),
        };

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id,
            offline,
            data_dir: env::var("IRONPATH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".ironpath")),
            owner_id: non_empty_var("IRONPATH_OWNER_ID"),
            guest_id: non_empty_var("IRONPATH_GUEST_ID"),
            rest_timer_secs: parse_or("REST_TIMER_SECS", 60)?,
            rest_timer_step_secs: parse_or("REST_TIMER_STEP_SECS", 30)?,
            tick_interval: Duration::from_millis(parse_or("TICK_INTERVAL_MS", 1000)?),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
