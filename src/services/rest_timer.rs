// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rest countdown between sets.
//!
//! Like the elapsed clock, the countdown stores an absolute end instant and
//! derives the remaining time on read.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::time_utils::format_countdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestTimer {
    target_secs: u64,
    step_secs: u64,
    ends_at: Option<DateTime<Utc>>,
}

/// Read-only view of the countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestStatus {
    pub running: bool,
    pub remaining_secs: u64,
    pub target_secs: u64,
    /// `m:ss`
    pub display: String,
}

impl RestTimer {
    pub fn new(target_secs: u64, step_secs: u64) -> Self {
        Self {
            target_secs,
            step_secs,
            ends_at: None,
        }
    }

    /// (Re)start the countdown at the current target.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.ends_at = Some(now + secs(self.target_secs));
    }

    /// Seconds left; `None` when no countdown is showing.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.ends_at
            .map(|end| (end - now).num_seconds().max(0) as u64)
    }

    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_some_and(|r| r > 0)
    }

    /// Add one step to a showing countdown.
    pub fn increment(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let remaining = self.remaining(now)?.saturating_add(self.step_secs);
        self.ends_at = Some(now + secs(remaining));
        Some(remaining)
    }

    /// Remove one step from a showing countdown, stopping at zero.
    pub fn decrement(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let remaining = self.remaining(now)?.saturating_sub(self.step_secs);
        self.ends_at = Some(now + secs(remaining));
        Some(remaining)
    }

    /// Change the default for subsequent sets; a showing countdown restarts
    /// at the new target.
    pub fn set_target(&mut self, now: DateTime<Utc>, target_secs: u64) {
        self.target_secs = target_secs;
        if self.ends_at.is_some() {
            self.start(now);
        }
    }

    pub fn skip(&mut self) {
        self.ends_at = None;
    }

    pub fn status(&self, now: DateTime<Utc>) -> RestStatus {
        let remaining = self.remaining(now).unwrap_or(0);
        RestStatus {
            running: self.is_running(now),
            remaining_secs: remaining,
            target_secs: self.target_secs,
            display: format_countdown(remaining),
        }
    }
}

/// Longest countdown representable; adjustments past a day are clamped.
const MAX_COUNTDOWN_SECS: u64 = 86_400;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_COUNTDOWN_SECS) as i64)
}
