// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rw_core::{BuildOutcome, Clock, FakeClock, Ref, Sha};
use std::time::Duration;

fn token() -> CancellationToken {
    CancellationToken::new()
}

fn channel() -> mpsc::Sender<Event> {
    mpsc::channel(16).0
}

#[tokio::test]
async fn fake_builder_records_invocations() {
    let clock = FakeClock::new();
    let builder = FakeBuildAdapter::new(clock);
    let r = Ref::new("refs/heads/main", "abc");
    builder.start_build("make ci", &r, token(), channel()).await.unwrap();

    assert_eq!(builder.build_count(), 1);
    let started = builder.started();
    assert_eq!(started[0].ref_name, "refs/heads/main");
    assert_eq!(started[0].cmd, "make ci");
}

#[tokio::test]
async fn instantaneous_build_is_due_immediately() {
    let clock = FakeClock::new();
    let builder = FakeBuildAdapter::new(clock.clone());
    builder.start_build("true", &Ref::new("r", "abc"), token(), channel()).await.unwrap();

    let due = builder.take_due(clock.now());
    assert_eq!(due.len(), 1);
    assert!(matches!(
        &due[0],
        Event::BuildFinished { sha, outcome: BuildOutcome::Completed } if *sha == Sha::new("abc")
    ));
    assert!(builder.take_due(clock.now()).is_empty());
}

#[tokio::test]
async fn timed_build_completes_only_after_its_duration() {
    let clock = FakeClock::new();
    let builder = FakeBuildAdapter::with_duration(clock.clone(), Duration::from_secs(2));
    builder.start_build("true", &Ref::new("r", "abc"), token(), channel()).await.unwrap();

    clock.advance(Duration::from_secs(1));
    assert!(builder.take_due(clock.now()).is_empty());
    assert!(builder.next_completion_at().is_some());

    clock.advance(Duration::from_secs(1));
    assert_eq!(builder.take_due(clock.now()).len(), 1);
    assert!(builder.next_completion_at().is_none());
}

#[tokio::test]
async fn cancelled_build_acknowledges_before_its_deadline() {
    let clock = FakeClock::new();
    let builder = FakeBuildAdapter::with_duration(clock.clone(), Duration::from_secs(10));
    let cancel = token();
    builder.start_build("true", &Ref::new("r", "abc"), cancel.clone(), channel()).await.unwrap();

    cancel.cancel();
    let due = builder.take_due(clock.now());
    assert_eq!(due.len(), 1);
    assert!(matches!(
        &due[0],
        Event::BuildFinished { outcome: BuildOutcome::Cancelled, .. }
    ));
}

#[tokio::test]
async fn failing_sha_reports_failure_outcome() {
    let clock = FakeClock::new();
    let builder = FakeBuildAdapter::new(clock.clone());
    builder.set_failing(Sha::new("bad"));
    builder.start_build("true", &Ref::new("r", "bad"), token(), channel()).await.unwrap();

    let due = builder.take_due(clock.now());
    assert!(matches!(
        &due[0],
        Event::BuildFinished { outcome: BuildOutcome::Failed { exit_code: Some(1) }, .. }
    ));
}

#[tokio::test]
async fn process_builder_reports_completion() {
    let (tx, mut rx) = mpsc::channel(16);
    let builder = ProcessBuildAdapter::new();
    builder.start_build("true", &Ref::new("refs/heads/main", "abc"), token(), tx).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert!(matches!(
        event,
        Event::BuildFinished { outcome: BuildOutcome::Completed, .. }
    ));
}

#[tokio::test]
async fn process_builder_reports_failure_exit_code() {
    let (tx, mut rx) = mpsc::channel(16);
    let builder = ProcessBuildAdapter::new();
    builder.start_build("exit 3", &Ref::new("refs/heads/main", "abc"), token(), tx).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert!(matches!(
        event,
        Event::BuildFinished { outcome: BuildOutcome::Failed { exit_code: Some(3) }, .. }
    ));
}

#[tokio::test]
async fn process_builder_cancellation_kills_and_acknowledges() {
    let (tx, mut rx) = mpsc::channel(16);
    let builder = ProcessBuildAdapter::new();
    let cancel = token();
    builder
        .start_build("sleep 30", &Ref::new("refs/heads/main", "abc"), cancel.clone(), tx)
        .await
        .unwrap();

    cancel.cancel();
    let event = rx.recv().await.unwrap();
    assert!(matches!(
        event,
        Event::BuildFinished { outcome: BuildOutcome::Cancelled, .. }
    ));
}
