// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout session records as held by the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Owner, SetRecord};

/// Remote identifier of a workout session (also the document ID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for a newly created session.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub owner: Owner,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Final duration in seconds, set on finish
    pub duration_secs: Option<u64>,
    pub notes: Option<String>,
}

impl SessionRecord {
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// A session together with all of its set rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDetail {
    pub session: SessionRecord,
    /// Ordered by creation, then set number
    pub sets: Vec<SetRecord>,
}

/// Duration to record on finish.
///
/// The client-measured value wins; a zero reading falls back to the
/// server-side span between start and end.
pub fn resolve_duration(
    client_secs: u64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> u64 {
    if client_secs > 0 {
        client_secs
    } else {
        (ended_at - started_at).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_client_duration_is_authoritative() {
        let start = Utc::now();
        let end = start + Duration::seconds(3600);
        assert_eq!(resolve_duration(1800, start, end), 1800);
    }

    #[test]
    fn test_zero_client_duration_falls_back_to_span() {
        let start = Utc::now();
        let end = start + Duration::seconds(754);
        assert_eq!(resolve_duration(0, start, end), 754);
        assert_eq!(resolve_duration(0, end, start), 0);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
