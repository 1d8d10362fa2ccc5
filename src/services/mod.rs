// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session engine.

pub mod cache;
pub mod ledger;
pub mod normalize;
pub mod rest_timer;
pub mod session;
pub mod timer;

pub use cache::{CachedSession, SessionCache};
pub use ledger::{ActiveExercise, SetField, SetLedger, SetPosition, SyncState, WorkoutSet};
pub use rest_timer::{RestStatus, RestTimer};
pub use session::{Prepared, SessionController, SessionSnapshot, SessionState};
pub use timer::{spawn_ticker, Clock, ElapsedClock, ManualClock, SystemClock};
