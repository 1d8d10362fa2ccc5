// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise catalog entries and previous-performance baselines.

use serde::{Deserialize, Serialize};

/// Catalog identifier of an exercise.
pub type ExerciseId = u64;

/// How an exercise's count field is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKind {
    /// Weight × repetitions
    #[default]
    #[serde(alias = "strength")]
    Reps,
    /// Held or timed work; the count field is seconds
    #[serde(alias = "cardio", alias = "time")]
    Duration,
}

/// Exercise catalog entry (read-only reference data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub name: String,
    #[serde(default)]
    pub tracking: TrackingKind,
}

/// Last completed weight/reps for an exercise, used to pre-fill new sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
}
