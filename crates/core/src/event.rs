// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events processed by the monitor's single logical executor.
//!
//! Everything that can change schedule state arrives here: timer firings from
//! the scheduler, fetch results from the ref fetcher task, and terminal build
//! outcomes from the builder.

use crate::refs::{Ref, Sha};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};

/// Terminal outcome of one build activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOutcome {
    Completed,
    Failed { exit_code: Option<i32> },
    Cancelled,
}

crate::simple_display! {
    BuildOutcome {
        Completed => "completed",
        Failed { .. } => "failed",
        Cancelled => "cancelled",
    }
}

/// Events consumed by the monitor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A scheduler timer fired
    TimerFired { id: TimerId },

    /// The in-flight ref fetch resolved with a snapshot
    RefsFetched { refs: Vec<Ref> },

    /// The in-flight ref fetch failed; the tick is skipped
    RefsFetchFailed { error: String },

    /// A build activity reached a terminal outcome
    BuildFinished { sha: Sha, outcome: BuildOutcome },
}

impl Event {
    /// Short event description for log spans.
    pub fn log_summary(&self) -> String {
        match self {
            Event::TimerFired { id } => format!("timer-fired {}", id),
            Event::RefsFetched { refs } => format!("refs-fetched n={}", refs.len()),
            Event::RefsFetchFailed { error } => format!("refs-fetch-failed {}", error),
            Event::BuildFinished { sha, outcome } => {
                format!("build-finished {} {}", sha.short(), outcome)
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
