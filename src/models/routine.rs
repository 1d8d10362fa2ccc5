// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routines: planned exercise lists used to seed a new session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExerciseId, Owner, SessionId, SetRecord, TrackingKind};

pub type RoutineId = u64;

/// A saved routine (owned by the routine-builder, read-only here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: RoutineId,
    pub owner: Owner,
    pub name: String,
    pub exercises: Vec<PlannedExercise>,
}

/// One planned exercise with its targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub exercise_id: ExerciseId,
    pub exercise_name: String,
    #[serde(default)]
    pub tracking: TrackingKind,
    pub order: u32,
    pub target_sets: u32,
    pub target_reps: u32,
    pub target_weight: Option<f64>,
}

impl Routine {
    /// Expand every planned exercise into `target_sets` uncompleted rows,
    /// numbered from 1, in plan order.
    ///
    /// Rows are stamped a microsecond apart so plan order survives a sort
    /// on `created_at`.
    pub fn seed_sets(&self, session_id: &SessionId, now: DateTime<Utc>) -> Vec<SetRecord> {
        let mut planned: Vec<&PlannedExercise> = self.exercises.iter().collect();
        planned.sort_by_key(|p| p.order);

        planned
            .into_iter()
            .flat_map(|p| (1..=p.target_sets).map(move |set_number| (p, set_number)))
            .enumerate()
            .map(|(i, (p, set_number))| {
                let stamp = now + Duration::microseconds(i as i64);
                SetRecord {
                    owner: self.owner.clone(),
                    session_id: session_id.clone(),
                    exercise_id: p.exercise_id,
                    exercise_name: p.exercise_name.clone(),
                    tracking: p.tracking,
                    set_number,
                    weight: Some(p.target_weight.unwrap_or(0.0)),
                    reps: Some(p.target_reps),
                    completed: false,
                    note: None,
                    created_at: stamp,
                    updated_at: stamp,
                }
            })
            .collect()
    }
}
