// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Set rows, their natural key, and write payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExerciseId, Owner, SessionId, TrackingKind};

/// Natural key of a set row: unique per (session, exercise, set number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetKey {
    pub session_id: SessionId,
    pub exercise_id: ExerciseId,
    /// 1-based, dense per exercise
    pub set_number: u32,
}

impl SetKey {
    pub fn new(session_id: SessionId, exercise_id: ExerciseId, set_number: u32) -> Self {
        Self {
            session_id,
            exercise_id,
            set_number,
        }
    }

    /// Document ID derived from the natural key, so writes to the same key
    /// always land on the same document.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.session_id, self.exercise_id, self.set_number
        )
    }
}

/// Normalized values written on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetValues {
    pub weight: f64,
    /// Repetitions, or seconds for duration exercises
    pub reps: u32,
    pub completed: bool,
    pub note: Option<String>,
}

/// Partial update of an existing row; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPatch {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub completed: Option<bool>,
    pub note: Option<String>,
}

/// Stored set row.
///
/// Exercise name and tracking kind are denormalized so a session can be
/// rebuilt without joining the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    pub owner: Owner,
    pub session_id: SessionId,
    pub exercise_id: ExerciseId,
    pub exercise_name: String,
    #[serde(default)]
    pub tracking: TrackingKind,
    pub set_number: u32,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub completed: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SetRecord {
    pub fn key(&self) -> SetKey {
        SetKey::new(self.session_id.clone(), self.exercise_id, self.set_number)
    }

    /// Apply the present fields of a patch.
    pub fn apply_patch(&mut self, patch: &SetPatch, now: DateTime<Utc>) {
        if let Some(weight) = patch.weight {
            self.weight = Some(weight);
        }
        if let Some(reps) = patch.reps {
            self.reps = Some(reps);
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(note) = &patch.note {
            // An empty note clears the stored one.
            self.note = Some(note.clone()).filter(|n| !n.is_empty());
        }
        self.updated_at = now;
    }
}
