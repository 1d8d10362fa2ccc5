// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local session cache.
//!
//! A single JSON slot on disk holding the active session so a restart
//! resumes without a round trip. Every write replaces the whole slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::SessionId;
use crate::services::ledger::ActiveExercise;

/// Fixed slot name; only one session occupies the cache at a time.
pub const CACHE_SLOT: &str = "ironpath_workout_state";

/// Cached state of the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSession {
    pub session_id: SessionId,
    pub active_exercises: Vec<ActiveExercise>,
    pub anchor: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    /// Cache slot inside `data_dir`; the directory is created on first write.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{CACHE_SLOT}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the slot. Absent, unreadable and corrupt slots all read as `None`.
    pub fn load(&self) -> Option<CachedSession> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read session cache");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding corrupt session cache");
                None
            }
        }
    }

    /// Replace the slot with `cached`.
    pub fn store(&self, cached: &CachedSession) -> Result<()> {
        let json = serde_json::to_vec(cached)
            .map_err(|e| AppError::Cache(format!("serialize: {}", e)))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::Cache(format!("create {}: {}", dir.display(), e)))?;
        }

        // Write then rename so a crash never leaves a half-written slot.
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json)
            .map_err(|e| AppError::Cache(format!("write {}: {}", temp.display(), e)))?;
        fs::rename(&temp, &self.path)
            .map_err(|e| AppError::Cache(format!("rename {}: {}", temp.display(), e)))?;

        Ok(())
    }

    /// Empty the slot.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Cache(format!(
                "remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
