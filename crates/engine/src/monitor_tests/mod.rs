// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor lifecycle and polling tests

mod scenarios;

use super::*;
use crate::test_helpers::{config, setup, setup_with, POLL};
use rw_core::test_support::{refs_fixture, ten_refs};
use rw_core::{BuildOutcome, FakeClock};
use rw_adapters::{FakeBuildAdapter, FakeRefFetcher};

#[tokio::test]
async fn first_poll_fires_after_one_interval_not_at_start() {
    let mut ctx = setup(ten_refs());
    ctx.monitor.start();
    ctx.drain().await;

    assert_eq!(ctx.fetcher.fetch_count(), 0);
    assert_eq!(ctx.builder.build_count(), 0);

    ctx.advance(POLL).await;
    assert_eq!(ctx.fetcher.fetch_count(), 1);
    assert_eq!(ctx.builder.build_count(), 10);
}

#[tokio::test]
async fn start_is_idempotent() {
    let mut ctx = setup(ten_refs());
    ctx.monitor.start();
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.fetcher.fetch_count(), 1, "double start must not double the poll timer");
}

#[tokio::test]
async fn identical_snapshot_launches_nothing_on_later_ticks() {
    let mut ctx = setup(ten_refs());
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 10);

    ctx.advance(POLL).await;
    ctx.advance(POLL).await;
    assert!(ctx.fetcher.fetch_count() >= 3);
    assert_eq!(ctx.builder.build_count(), 10);
}

#[tokio::test]
async fn dispose_stops_fetching_and_building() {
    let mut ctx = setup(ten_refs());
    ctx.monitor.start();
    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 10);

    ctx.monitor.dispose();
    ctx.monitor.dispose();

    let fetches = ctx.fetcher.fetch_count();
    ctx.advance(POLL * 10).await;
    assert_eq!(ctx.fetcher.fetch_count(), fetches);
    assert_eq!(ctx.builder.build_count(), 10);
}

#[tokio::test]
async fn dispose_before_first_tick_means_no_work_at_all() {
    let mut ctx = setup(ten_refs());
    ctx.monitor.start();
    ctx.monitor.dispose();

    ctx.advance(POLL * 6).await;
    assert_eq!(ctx.fetcher.fetch_count(), 0);
    assert_eq!(ctx.builder.build_count(), 0);
}

#[tokio::test]
async fn fetch_error_skips_the_tick_and_polling_recovers() {
    let mut ctx = setup(ten_refs());
    ctx.fetcher.set_error("upstream 503");
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.fetcher.fetch_count(), 1);
    assert_eq!(ctx.builder.build_count(), 0);

    ctx.fetcher.set_refs(ten_refs());
    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 10);
}

#[tokio::test]
async fn tick_landing_mid_fetch_is_skipped_not_queued() {
    let mut ctx = setup(ten_refs());
    ctx.fetcher.hold();
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.fetcher.fetch_count(), 1);

    // next tick fires while the first fetch is still open
    ctx.advance(POLL).await;
    assert_eq!(ctx.fetcher.fetch_count(), 1, "tick must be skipped while a fetch is in flight");

    ctx.fetcher.release();
    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 10);
    assert_eq!(ctx.fetcher.fetch_count(), 2, "polling resumes after the fetch resolves");
}

#[tokio::test]
async fn seeded_seen_set_suppresses_all_builds() {
    let refs = ten_refs();
    let mut ctx = setup(refs.clone());
    ctx.monitor.seed_seen(refs.iter().map(|r| r.sha().clone())).unwrap();
    ctx.monitor.start();

    ctx.advance(POLL * 6).await;
    assert!(ctx.fetcher.fetch_count() >= 5);
    assert_eq!(ctx.builder.build_count(), 0);
}

#[tokio::test]
async fn seeding_after_start_is_rejected() {
    let ctx = setup(ten_refs());
    ctx.monitor.start();
    let err = ctx.monitor.seed_seen([rw_core::Sha::new("abc")]).unwrap_err();
    assert_eq!(err, MonitorError::SeedAfterStart);
}

#[tokio::test]
async fn zero_poll_interval_is_rejected() {
    let clock = FakeClock::new();
    let (event_tx, _rx) = mpsc::channel(16);
    let err = Monitor::new(
        FakeRefFetcher::new(vec![]),
        FakeBuildAdapter::new(clock.clone()),
        clock,
        MonitorConfig {
            poll_interval: Duration::ZERO,
            max_concurrent: 2,
            build_cmd: "make build".to_string(),
        },
        event_tx,
    )
    .err();
    assert_eq!(err, Some(ConfigError::InvalidPollInterval));
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let clock = FakeClock::new();
    let (event_tx, _rx) = mpsc::channel(16);
    let err = Monitor::new(
        FakeRefFetcher::new(vec![]),
        FakeBuildAdapter::new(clock.clone()),
        clock,
        MonitorConfig {
            poll_interval: POLL,
            max_concurrent: 0,
            build_cmd: "make build".to_string(),
        },
        event_tx,
    )
    .err();
    assert_eq!(err, Some(ConfigError::InvalidConcurrency));
}

#[tokio::test]
async fn duplicate_shas_in_one_snapshot_build_once() {
    let mut ctx = setup(refs_fixture(&[
        ("refs/heads/main", "same"),
        ("refs/tags/v1.0", "same"),
    ]));
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 1);
    assert_eq!(ctx.builder.started()[0].ref_name, "refs/heads/main");
}

#[tokio::test]
async fn single_slot_serializes_builds_in_snapshot_order() {
    let mut ctx = setup_with(
        MonitorConfig { max_concurrent: 1, ..config() },
        refs_fixture(&[("a", "s1"), ("b", "s2"), ("c", "s3")]),
        Duration::from_secs(1),
    );
    ctx.monitor.start();

    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 1, "one slot, one running build");

    ctx.advance(Duration::from_secs(3)).await;
    let started = ctx.builder.started();
    let order: Vec<&str> = started.iter().map(|b| b.sha.as_str()).collect();
    assert_eq!(order, vec!["s1", "s2", "s3"]);
    assert_eq!(ctx.monitor.stats().completed, 3);
}

#[tokio::test]
async fn events_after_dispose_are_dropped() {
    let ctx = setup(ten_refs());
    ctx.monitor.start();
    ctx.monitor.dispose();

    ctx.monitor
        .handle_event(Event::BuildFinished {
            sha: rw_core::Sha::new("abc"),
            outcome: BuildOutcome::Completed,
        })
        .await;
    assert_eq!(ctx.monitor.stats(), DispatchStats::default());
}
