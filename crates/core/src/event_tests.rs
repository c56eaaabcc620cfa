// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::refs::Ref;

#[test]
fn log_summary_is_compact() {
    let ev = Event::RefsFetched { refs: vec![Ref::new("refs/heads/main", "abc")] };
    assert_eq!(ev.log_summary(), "refs-fetched n=1");

    let ev = Event::BuildFinished {
        sha: Sha::new("aa218f56b14c9653891f9e74264a383fa43fefbd"),
        outcome: BuildOutcome::Completed,
    };
    assert_eq!(ev.log_summary(), "build-finished aa218f56b14c completed");
}

#[test]
fn outcome_display_names() {
    assert_eq!(BuildOutcome::Completed.to_string(), "completed");
    assert_eq!(BuildOutcome::Failed { exit_code: Some(2) }.to_string(), "failed");
    assert_eq!(BuildOutcome::Cancelled.to_string(), "cancelled");
}

#[test]
fn event_round_trips_through_json() {
    let ev = Event::BuildFinished {
        sha: Sha::new("abc"),
        outcome: BuildOutcome::Failed { exit_code: None },
    };
    let json = serde_json::to_string(&ev).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(ev, back);
}
