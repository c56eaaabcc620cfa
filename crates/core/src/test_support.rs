// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::refs::{Ref, Sha};

/// Build a snapshot from `(name, sha)` pairs.
pub fn refs_fixture(entries: &[(&str, &str)]) -> Vec<Ref> {
    entries.iter().map(|&(name, sha)| Ref::new(name, sha)).collect()
}

/// Build a `Vec<Sha>` from string literals.
pub fn shas(values: &[&str]) -> Vec<Sha> {
    values.iter().map(|s| Sha::new(*s)).collect()
}

/// A ten-ref snapshot with distinct SHAs, the standing fixture for
/// supervisor scenarios.
pub fn ten_refs() -> Vec<Ref> {
    (0..10)
        .map(|i| Ref::new(format!("refs/heads/branch-{i}"), format!("{:040x}", i + 1)))
        .collect()
}
