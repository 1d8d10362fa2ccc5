// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Set ledger: the working copy of a session's exercises and sets.
//!
//! Holds user input as typed text and applies edits in memory only. The
//! session controller decides which edits also go to the remote store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Baseline, Exercise, ExerciseId, SetRecord, SetValues, TrackingKind};
use crate::services::normalize::{normalize_number, normalize_reps};

/// Remote state of one set as far as this device knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never written remotely from here
    #[default]
    LocalOnly,
    /// A write is in flight
    Pending,
    /// Last write was acknowledged, or the row was loaded from the store
    Synced,
    /// Last write failed; local and remote may disagree
    Failed,
}

/// Editable value fields of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetField {
    Weight,
    Reps,
}

/// One set as the user sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub set_number: u32,
    /// Raw text, normalized only when written remotely
    pub weight: String,
    /// Raw text: repetitions, or a duration for timed exercises
    pub reps: String,
    pub completed: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub sync: SyncState,
    /// Sequence number of the latest remote write issued for this set
    #[serde(default)]
    pub write_seq: u64,
}

impl WorkoutSet {
    fn blank(set_number: u32) -> Self {
        Self {
            set_number,
            weight: String::new(),
            reps: String::new(),
            completed: false,
            note: None,
            sync: SyncState::LocalOnly,
            write_seq: 0,
        }
    }

    /// Normalized payload for a remote write.
    pub fn values(&self, tracking: TrackingKind) -> SetValues {
        SetValues {
            weight: normalize_number(&self.weight),
            reps: normalize_reps(&self.reps, tracking),
            completed: self.completed,
            note: self.note.clone(),
        }
    }
}

/// An exercise within the running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveExercise {
    /// Stable per-entry identifier for UI keys
    pub id: String,
    pub exercise: Exercise,
    pub sets: Vec<WorkoutSet>,
    #[serde(default)]
    pub baseline: Option<Baseline>,
    /// Baseline fetch already attempted for this session-exercise pair
    #[serde(default)]
    pub baseline_loaded: bool,
}

impl ActiveExercise {
    fn new(exercise: Exercise, sets: Vec<WorkoutSet>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            exercise,
            sets,
            baseline: None,
            baseline_loaded: false,
        }
    }

    fn next_set_number(&self) -> u32 {
        // Equals count + 1 while numbering stays dense.
        self.sets.iter().map(|s| s.set_number).max().unwrap_or(0) + 1
    }
}

/// Ordered per-exercise set lists.
/// Location of a set within the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetPosition {
    pub exercise_index: usize,
    pub set_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetLedger {
    exercises: Vec<ActiveExercise>,
}

impl SetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exercises(exercises: Vec<ActiveExercise>) -> Self {
        Self { exercises }
    }

    /// Rebuild from stored rows, grouped by exercise in first-seen order.
    pub fn from_remote(sets: &[SetRecord], baselines: &HashMap<ExerciseId, Baseline>) -> Self {
        let mut exercises: Vec<ActiveExercise> = Vec::new();

        for row in sets {
            let index = match exercises
                .iter()
                .position(|e| e.exercise.id == row.exercise_id)
            {
                Some(index) => index,
                None => {
                    let exercise = Exercise {
                        id: row.exercise_id,
                        name: row.exercise_name.clone(),
                        tracking: row.tracking,
                    };
                    let mut active = ActiveExercise::new(exercise, Vec::new());
                    active.baseline = baselines.get(&row.exercise_id).copied();
                    active.baseline_loaded = true;
                    exercises.push(active);
                    exercises.len() - 1
                }
            };

            exercises[index].sets.push(WorkoutSet {
                set_number: row.set_number,
                weight: display_number(row.weight),
                reps: row.reps.filter(|r| *r != 0).map(|r| r.to_string()).unwrap_or_default(),
                completed: row.completed,
                note: row.note.clone(),
                sync: SyncState::Synced,
                write_seq: 0,
            });
        }

        Self { exercises }
    }

    pub fn exercises(&self) -> &[ActiveExercise] {
        &self.exercises
    }

    pub fn clear(&mut self) {
        self.exercises.clear();
    }

    pub fn exercise(&self, exercise_index: usize) -> Result<&ActiveExercise> {
        let len = self.exercises.len();
        self.exercises.get(exercise_index).ok_or(AppError::OutOfRange {
            what: "exercises",
            index: exercise_index,
            len,
        })
    }

    fn exercise_mut(&mut self, exercise_index: usize) -> Result<&mut ActiveExercise> {
        let len = self.exercises.len();
        self.exercises
            .get_mut(exercise_index)
            .ok_or(AppError::OutOfRange {
                what: "exercises",
                index: exercise_index,
                len,
            })
    }

    pub fn set(&self, exercise_index: usize, set_index: usize) -> Result<&WorkoutSet> {
        let exercise = self.exercise(exercise_index)?;
        let len = exercise.sets.len();
        exercise.sets.get(set_index).ok_or(AppError::OutOfRange {
            what: "sets",
            index: set_index,
            len,
        })
    }

    fn set_mut(&mut self, exercise_index: usize, set_index: usize) -> Result<&mut WorkoutSet> {
        let exercise = self.exercise_mut(exercise_index)?;
        let len = exercise.sets.len();
        exercise.sets.get_mut(set_index).ok_or(AppError::OutOfRange {
            what: "sets",
            index: set_index,
            len,
        })
    }

    /// Append an exercise with one blank set; returns its index.
    ///
    /// An exercise already in the ledger is not added twice (its sets would
    /// share natural keys); the existing index is returned instead.
    pub fn add_exercise(&mut self, exercise: Exercise) -> usize {
        if let Some(index) = self
            .exercises
            .iter()
            .position(|e| e.exercise.id == exercise.id)
        {
            return index;
        }

        self.exercises
            .push(ActiveExercise::new(exercise, vec![WorkoutSet::blank(1)]));
        self.exercises.len() - 1
    }

    /// Append a set, pre-filled from the preceding set, else the baseline.
    ///
    /// Returns the new set's index.
    pub fn add_set(&mut self, exercise_index: usize) -> Result<usize> {
        let exercise = self.exercise_mut(exercise_index)?;
        let mut set = WorkoutSet::blank(exercise.next_set_number());

        if let Some(last) = exercise.sets.last() {
            set.weight = last.weight.clone();
            set.reps = last.reps.clone();
        } else if let Some(baseline) = exercise.baseline {
            set.weight = display_number(baseline.weight);
            set.reps = baseline
                .reps
                .filter(|r| *r != 0)
                .map(|r| r.to_string())
                .unwrap_or_default();
        }

        exercise.sets.push(set);
        Ok(exercise.sets.len() - 1)
    }

    pub fn update_weight(&mut self, exercise_index: usize, set_index: usize, value: &str) -> Result<()> {
        self.set_mut(exercise_index, set_index)?.weight = value.to_string();
        Ok(())
    }

    pub fn update_reps(&mut self, exercise_index: usize, set_index: usize, value: &str) -> Result<()> {
        self.set_mut(exercise_index, set_index)?.reps = value.to_string();
        Ok(())
    }

    pub fn edit_value(
        &mut self,
        exercise_index: usize,
        set_index: usize,
        field: SetField,
        value: &str,
    ) -> Result<()> {
        match field {
            SetField::Weight => self.update_weight(exercise_index, set_index, value),
            SetField::Reps => self.update_reps(exercise_index, set_index, value),
        }
    }

    /// Replace the note; an empty note clears it.
    pub fn set_note(&mut self, exercise_index: usize, set_index: usize, note: &str) -> Result<()> {
        let set = self.set_mut(exercise_index, set_index)?;
        set.note = if note.trim().is_empty() {
            None
        } else {
            Some(note.to_string())
        };
        Ok(())
    }

    /// Flip the completion flag; returns the new value.
    pub fn toggle_completion(&mut self, exercise_index: usize, set_index: usize) -> Result<bool> {
        let set = self.set_mut(exercise_index, set_index)?;
        set.completed = !set.completed;
        Ok(set.completed)
    }

    pub fn set_baseline(&mut self, exercise_index: usize, baseline: Option<Baseline>) -> Result<()> {
        let exercise = self.exercise_mut(exercise_index)?;
        exercise.baseline = baseline;
        exercise.baseline_loaded = true;
        Ok(())
    }

    /// Record that a remote write was issued; returns its sequence number.
    pub fn mark_pending(&mut self, exercise_index: usize, set_index: usize) -> Result<u64> {
        let set = self.set_mut(exercise_index, set_index)?;
        set.write_seq += 1;
        set.sync = SyncState::Pending;
        Ok(set.write_seq)
    }

    /// Apply a write outcome if it is still the latest write for that set.
    ///
    /// Returns `false` when the outcome is stale or the set is gone.
    pub fn apply_sync_outcome(
        &mut self,
        exercise_id: ExerciseId,
        set_number: u32,
        write_seq: u64,
        succeeded: bool,
    ) -> bool {
        let set = self
            .exercises
            .iter_mut()
            .filter(|e| e.exercise.id == exercise_id)
            .flat_map(|e| e.sets.iter_mut())
            .find(|s| s.set_number == set_number);

        match set {
            Some(set) if set.write_seq == write_seq => {
                set.sync = if succeeded {
                    SyncState::Synced
                } else {
                    SyncState::Failed
                };
                true
            }
            _ => false,
        }
    }

    /// Writes still marked in flight become failed; used after a reload,
    /// when their outcome can no longer be observed.
    pub fn fail_pending(&mut self) {
        for set in self.exercises.iter_mut().flat_map(|e| e.sets.iter_mut()) {
            if set.sync == SyncState::Pending {
                set.sync = SyncState::Failed;
            }
        }
    }

    /// Sets whose last remote write failed and may differ from the store.
    pub fn failed_sets(&self) -> Vec<SetPosition> {
        self.exercises
            .iter()
            .enumerate()
            .flat_map(|(exercise_index, e)| {
                e.sets
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.sync == SyncState::Failed)
                    .map(move |(set_index, _)| SetPosition {
                        exercise_index,
                        set_index,
                    })
            })
            .collect()
    }

    /// Total lifted volume (weight × reps) over completed repetition sets.
    pub fn total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .filter(|e| e.exercise.tracking == TrackingKind::Reps)
            .flat_map(|e| e.sets.iter())
            .filter(|s| s.completed)
            .map(|s| {
                let values = s.values(TrackingKind::Reps);
                values.weight * f64::from(values.reps)
            })
            .sum()
    }
}

/// Render a stored number for an input field; zero and absent are blank.
fn display_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 => v.to_string(),
        _ => String::new(),
    }
}
