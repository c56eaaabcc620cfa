// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rw-adapters: the refwatch core's external collaborators.
//!
//! The monitor only ever talks to an upstream host through [`RefFetcher`] and
//! to a build substrate through [`BuildAdapter`]; both come with fake
//! implementations for deterministic tests.

pub mod build;
pub mod fetch;

pub use build::{BuildAdapter, BuildError, ProcessBuildAdapter};
pub use fetch::{FetchError, GithubRefFetcher, RefFetcher};

#[cfg(any(test, feature = "test-support"))]
pub use build::FakeBuildAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use fetch::FakeRefFetcher;
