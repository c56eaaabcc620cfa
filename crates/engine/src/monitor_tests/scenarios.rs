// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end supervisor scenarios on virtual time.
//!
//! Fixed setup throughout: two build slots, a five-second poll interval, a
//! ten-ref fixture ("refs1"), with variants swapped in per scenario.

use crate::test_helpers::{config, setup_with, POLL};
use rw_core::test_support::ten_refs;
use rw_core::Ref;
use std::time::Duration;

/// refs1 with the SHA of `branch` replaced.
fn with_moved_ref(branch: usize, new_sha: &str) -> Vec<Ref> {
    let mut refs = ten_refs();
    refs[branch] = Ref::new(refs[branch].name.clone(), new_sha);
    refs
}

#[tokio::test]
async fn blank_slate_builds_every_ref_exactly_once() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::ZERO);
    ctx.monitor.start();

    ctx.advance(Duration::from_secs(30)).await;

    assert_eq!(ctx.builder.build_count(), 10);
    let stats = ctx.monitor.stats();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn stable_snapshot_plus_one_change_builds_one_more() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::ZERO);
    ctx.monitor.start();

    ctx.advance(POLL + Duration::from_secs(1)).await;
    assert_eq!(ctx.builder.build_count(), 10);

    ctx.fetcher.set_refs(with_moved_ref(4, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    ctx.advance(POLL).await;
    assert_eq!(ctx.builder.build_count(), 11);
}

#[tokio::test]
async fn concurrency_cap_holds_while_completions_progress() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::from_secs(2));
    ctx.monitor.start();

    ctx.advance(POLL + Duration::from_millis(2)).await;
    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 2);
    assert_eq!(stats.completed, 0);

    // one more interval: completions come in pairs, cap stays saturated
    ctx.advance(POLL).await;
    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 2);
    assert_eq!(stats.completed, 4);

    ctx.advance(Duration::from_secs(30)).await;
    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 0);
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.cancelled, 0);
}

#[tokio::test]
async fn completed_count_is_monotone_and_cap_never_exceeded() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::from_secs(2));
    ctx.monitor.start();

    let mut last_completed = 0;
    for _ in 0..12 {
        ctx.advance(Duration::from_secs(3)).await;
        let stats = ctx.monitor.stats();
        assert!(stats.running <= 2);
        assert!(stats.completed >= last_completed);
        last_completed = stats.completed;
    }
    assert_eq!(last_completed, 10);
}

#[tokio::test]
async fn stable_refs_are_never_spuriously_cancelled() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::from_secs(2));
    ctx.monitor.start();

    for _ in 0..8 {
        ctx.advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.monitor.stats().cancelled, 0);
    }
    assert_eq!(ctx.monitor.stats().completed, 10);
}

#[tokio::test]
async fn build_is_cancelled_when_its_ref_disappears() {
    let refs1 = ten_refs();
    let x = Ref::new("refs/heads/feature-x", "ffffffffffffffffffffffffffffffffffffff01");
    let y = Ref::new("refs/heads/feature-y", "ffffffffffffffffffffffffffffffffffffff02");

    let mut refs3 = refs1.clone();
    refs3.push(x.clone());
    refs3.push(y.clone());

    // long builds so both are still live when the ref set changes
    let mut ctx = setup_with(config(), refs3, Duration::from_secs(10));
    ctx.monitor.seed_seen(refs1.iter().map(|r| r.sha().clone())).unwrap();
    ctx.monitor.start();

    ctx.advance(POLL + Duration::from_secs(1)).await;
    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 2);
    assert_eq!(ctx.builder.build_count(), 2);

    // Y's ref is deleted upstream
    let mut refs4 = refs1.clone();
    refs4.push(x.clone());
    ctx.fetcher.set_refs(refs4);

    ctx.advance(POLL + Duration::from_secs(1)).await;
    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 1);
    assert_eq!(stats.cancelled, 1);
    assert!(ctx.monitor.active_shas().contains(x.sha()));
}

#[tokio::test]
async fn moved_ref_cancels_old_build_and_admits_new_sha() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::from_secs(10));
    ctx.monitor.start();

    ctx.advance(POLL + Duration::from_secs(1)).await;
    assert_eq!(ctx.monitor.stats().running, 2);

    // branch-0 is one of the two running builds; move it to a new SHA
    ctx.fetcher.set_refs(with_moved_ref(0, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
    ctx.advance(POLL + Duration::from_secs(1)).await;

    let stats = ctx.monitor.stats();
    assert_eq!(stats.running, 2, "cancellation frees the slot for queued work");
    assert_eq!(stats.cancelled, 1);
    assert!(!ctx.monitor.active_shas().contains(ten_refs()[0].sha()));
}

#[tokio::test]
async fn cancelled_sha_is_not_relaunched_if_it_returns() {
    let mut ctx = setup_with(config(), ten_refs(), Duration::from_secs(10));
    ctx.monitor.start();

    ctx.advance(POLL + Duration::from_secs(1)).await;
    ctx.fetcher.set_refs(with_moved_ref(0, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
    ctx.advance(POLL).await;
    assert_eq!(ctx.monitor.stats().cancelled, 1);

    // the original SHA comes back; it is still seen and stays dead
    ctx.fetcher.set_refs(ten_refs());
    ctx.advance(POLL * 3).await;
    let started = ctx.builder.started();
    let relaunches = started
        .iter()
        .filter(|b| b.sha == *ten_refs()[0].sha())
        .count();
    assert_eq!(relaunches, 1, "a seen SHA is never relaunched");
}
