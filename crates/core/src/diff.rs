// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot diffing: which refs need a build, which builds lost their ref.
//!
//! Pure function of `(snapshot, seen, running)`. All mutation — marking SHAs
//! seen, launching, cancelling — is the monitor's job.

use crate::refs::{Ref, Sha};
use crate::seen::SeenCommits;
use std::collections::HashSet;

/// Result of diffing one snapshot against the current schedule state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefDiff {
    /// Refs whose SHA has no build yet, in snapshot order.
    pub to_launch: Vec<Ref>,
    /// Running builds whose SHA no longer appears in the snapshot.
    pub to_cancel: Vec<Sha>,
}

impl RefDiff {
    pub fn is_empty(&self) -> bool {
        self.to_launch.is_empty() && self.to_cancel.is_empty()
    }
}

/// Diff a ref snapshot against the seen set and the running builds.
///
/// `to_launch` preserves snapshot iteration order so admission order under a
/// saturated dispatcher is predictable; a SHA appearing under several refs is
/// admitted once, for the first ref carrying it. `to_cancel` covers both a
/// deleted ref and a ref that moved to a different SHA — in either case the
/// old SHA has left the snapshot.
pub fn diff(snapshot: &[Ref], seen: &SeenCommits, running: &HashSet<Sha>) -> RefDiff {
    let mut admitted: HashSet<&Sha> = HashSet::new();
    let mut to_launch = Vec::new();
    for r in snapshot {
        if seen.contains(r.sha()) || !admitted.insert(r.sha()) {
            continue;
        }
        to_launch.push(r.clone());
    }

    let snapshot_shas: HashSet<&Sha> = snapshot.iter().map(Ref::sha).collect();
    let mut to_cancel: Vec<Sha> =
        running.iter().filter(|sha| !snapshot_shas.contains(*sha)).cloned().collect();
    to_cancel.sort();

    RefDiff { to_launch, to_cancel }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
