// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn poll_timer_round_trip() {
    let id = TimerId::poll();
    assert!(id.is_poll());
    assert_eq!(id.as_str(), "poll");
    assert_eq!(id.to_string(), "poll");
}

#[test]
fn arbitrary_ids_are_not_poll() {
    assert!(!TimerId::new("drain").is_poll());
}
