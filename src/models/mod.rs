// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod exercise;
pub mod owner;
pub mod routine;
pub mod session;
pub mod set;

pub use exercise::{Baseline, Exercise, ExerciseId, TrackingKind};
pub use owner::Owner;
pub use routine::{PlannedExercise, Routine, RoutineId};
pub use session::{resolve_duration, SessionDetail, SessionId, SessionRecord};
pub use set::{SetKey, SetPatch, SetRecord, SetValues};
