// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

/// Rejected configuration, reported at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_concurrent must be at least 1")]
    InvalidConcurrency,

    #[error("poll_interval must be positive")]
    InvalidPollInterval,
}

/// Errors from monitor API misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("seen commits can only be seeded before the monitor starts")]
    SeedAfterStart,
}
