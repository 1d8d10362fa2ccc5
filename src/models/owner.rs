// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner identity scoping every remote record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity that owns sessions and sets in the remote store.
///
/// Never blank: construction fails for empty or whitespace-only ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Signed-in identity first, then the device's guest identity.
    pub fn resolve(owner_id: Option<&str>, guest_id: Option<&str>) -> Option<Self> {
        owner_id
            .and_then(Owner::new)
            .or_else(|| guest_id.and_then(Owner::new))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
