// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{refs_fixture, shas};
use proptest::prelude::*;

fn running(shas: &[&str]) -> HashSet<Sha> {
    shas.iter().map(|s| Sha::new(*s)).collect()
}

#[test]
fn unseen_refs_are_launched_in_snapshot_order() {
    let snapshot = refs_fixture(&[("refs/heads/a", "s1"), ("refs/heads/b", "s2")]);
    let d = diff(&snapshot, &SeenCommits::new(), &HashSet::new());
    assert_eq!(d.to_launch.len(), 2);
    assert_eq!(d.to_launch[0].name, "refs/heads/a");
    assert_eq!(d.to_launch[1].name, "refs/heads/b");
    assert!(d.to_cancel.is_empty());
}

#[test]
fn seen_refs_are_not_relaunched() {
    let snapshot = refs_fixture(&[("refs/heads/a", "s1"), ("refs/heads/b", "s2")]);
    let seen: SeenCommits = shas(&["s1"]).into_iter().collect();
    let d = diff(&snapshot, &seen, &HashSet::new());
    assert_eq!(d.to_launch.len(), 1);
    assert_eq!(d.to_launch[0].sha().as_str(), "s2");
}

#[test]
fn duplicate_shas_admit_first_ref_only() {
    let snapshot = refs_fixture(&[
        ("refs/heads/main", "same"),
        ("refs/tags/v1", "same"),
        ("refs/heads/dev", "other"),
    ]);
    let d = diff(&snapshot, &SeenCommits::new(), &HashSet::new());
    assert_eq!(d.to_launch.len(), 2);
    assert_eq!(d.to_launch[0].name, "refs/heads/main");
    assert_eq!(d.to_launch[1].name, "refs/heads/dev");
}

#[test]
fn running_build_missing_from_snapshot_is_cancelled() {
    // "b" was deleted, "c" moved to c2: both old SHAs leave the snapshot
    let snapshot = refs_fixture(&[("refs/heads/a", "a1"), ("refs/heads/c", "c2")]);
    let seen: SeenCommits = shas(&["a1", "b1", "c1"]).into_iter().collect();
    let d = diff(&snapshot, &seen, &running(&["a1", "b1", "c1"]));
    assert_eq!(d.to_cancel, shas(&["b1", "c1"]));
}

#[test]
fn moved_ref_launches_new_sha_and_cancels_old() {
    let snapshot = refs_fixture(&[("refs/heads/main", "new")]);
    let seen: SeenCommits = shas(&["old"]).into_iter().collect();
    let d = diff(&snapshot, &seen, &running(&["old"]));
    assert_eq!(d.to_launch.len(), 1);
    assert_eq!(d.to_launch[0].sha().as_str(), "new");
    assert_eq!(d.to_cancel, shas(&["old"]));
}

#[test]
fn identical_snapshot_twice_is_a_noop_second_time() {
    let snapshot = refs_fixture(&[("refs/heads/a", "s1"), ("refs/heads/b", "s2")]);
    let mut seen = SeenCommits::new();
    let first = diff(&snapshot, &seen, &HashSet::new());
    seen.add_all(first.to_launch.iter().map(|r| r.sha().clone()));
    let second = diff(&snapshot, &seen, &running(&["s1", "s2"]));
    assert!(second.is_empty());
}

#[test]
fn empty_snapshot_cancels_everything_running() {
    let seen: SeenCommits = shas(&["x", "y"]).into_iter().collect();
    let d = diff(&[], &seen, &running(&["x", "y"]));
    assert!(d.to_launch.is_empty());
    assert_eq!(d.to_cancel, shas(&["x", "y"]));
}

proptest! {
    #[test]
    fn launch_set_never_intersects_seen(
        snapshot_shas in proptest::collection::vec("[a-f0-9]{8}", 0..20),
        seen_shas in proptest::collection::vec("[a-f0-9]{8}", 0..20),
    ) {
        let snapshot: Vec<Ref> = snapshot_shas
            .iter()
            .enumerate()
            .map(|(i, s)| Ref::new(format!("refs/heads/b{i}"), s.as_str()))
            .collect();
        let seen: SeenCommits = seen_shas.iter().map(|s| Sha::new(s.as_str())).collect();
        let d = diff(&snapshot, &seen, &HashSet::new());

        for r in &d.to_launch {
            prop_assert!(!seen.contains(r.sha()));
        }
        // one launch per distinct unseen SHA
        let distinct: HashSet<&Sha> = d.to_launch.iter().map(Ref::sha).collect();
        prop_assert_eq!(distinct.len(), d.to_launch.len());
    }

    #[test]
    fn cancel_set_is_subset_of_running_and_disjoint_from_snapshot(
        snapshot_shas in proptest::collection::vec("[a-f0-9]{8}", 0..20),
        running_shas in proptest::collection::vec("[a-f0-9]{8}", 0..20),
    ) {
        let snapshot: Vec<Ref> = snapshot_shas
            .iter()
            .enumerate()
            .map(|(i, s)| Ref::new(format!("refs/heads/b{i}"), s.as_str()))
            .collect();
        let run: HashSet<Sha> = running_shas.iter().map(|s| Sha::new(s.as_str())).collect();
        let d = diff(&snapshot, &SeenCommits::new(), &run);

        let in_snapshot: HashSet<&str> =
            snapshot_shas.iter().map(String::as_str).collect();
        for sha in &d.to_cancel {
            prop_assert!(run.contains(sha));
            prop_assert!(!in_snapshot.contains(sha.as_str()));
        }
    }
}
