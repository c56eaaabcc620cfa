// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier for scheduler entries.
//!
//! The monitor owns a single periodic timer (the poll tick); the id type is
//! kept open-ended so additional timers route through the same scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The periodic poll tick driving the supervisor loop.
    pub fn poll() -> Self {
        Self::new("poll")
    }

    pub fn is_poll(&self) -> bool {
        self.0 == "poll"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
