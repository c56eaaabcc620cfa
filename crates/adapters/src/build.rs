// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build launching: one cancellable activity per dispatched ref.

use async_trait::async_trait;
use rw_core::{Event, Ref};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from launching a build activity.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to launch build: {0}")]
    Launch(String),
}

/// Adapter that runs one build per dispatched ref.
///
/// `start_build` must return without waiting for the build. The terminal
/// outcome is delivered back as [`Event::BuildFinished`] on `event_tx`; the
/// activity is expected to acknowledge `cancel` by stopping and reporting a
/// cancelled outcome, though the dispatcher does not wait for it.
#[async_trait]
pub trait BuildAdapter: Clone + Send + Sync + 'static {
    async fn start_build(
        &self,
        cmd: &str,
        r: &Ref,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<(), BuildError>;
}

/// Builder that runs the configured command as a local process.
///
/// The command string is opaque: it is handed to `bash -c` untouched, with
/// the ref name and SHA exposed through `REFWATCH_REF` / `REFWATCH_SHA`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessBuildAdapter;

impl ProcessBuildAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildAdapter for ProcessBuildAdapter {
    async fn start_build(
        &self,
        cmd: &str,
        r: &Ref,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<(), BuildError> {
        use rw_core::BuildOutcome;
        use std::process::Stdio;

        let sha = r.sha().clone();
        let ref_name = r.name.clone();
        let wrapped = format!("set -euo pipefail\n{cmd}");

        let mut command = tokio::process::Command::new("bash");
        command
            .arg("-c")
            .arg(&wrapped)
            .env("REFWATCH_REF", &ref_name)
            .env("REFWATCH_SHA", sha.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| BuildError::Launch(format!("spawn '{cmd}': {e}")))?;

        tokio::spawn(async move {
            tracing::info!(%ref_name, sha = sha.short(), "build started");

            let outcome = tokio::select! {
                result = child.wait_with_output() => match result {
                    Ok(output) if output.status.success() => {
                        if !output.stdout.is_empty() {
                            tracing::info!(
                                sha = sha.short(),
                                stdout = %String::from_utf8_lossy(&output.stdout),
                                "build stdout"
                            );
                        }
                        BuildOutcome::Completed
                    }
                    Ok(output) => {
                        tracing::warn!(
                            sha = sha.short(),
                            exit_code = output.status.code().unwrap_or(-1),
                            stderr = %String::from_utf8_lossy(&output.stderr),
                            "build failed"
                        );
                        BuildOutcome::Failed { exit_code: output.status.code() }
                    }
                    Err(e) => {
                        tracing::error!(sha = sha.short(), error = %e, "build wait failed");
                        BuildOutcome::Failed { exit_code: None }
                    }
                },
                // Dropping the child kills it (kill_on_drop)
                _ = cancel.cancelled() => {
                    tracing::debug!(sha = sha.short(), "build cancelled, killing process");
                    BuildOutcome::Cancelled
                }
            };

            if let Err(e) = event_tx.send(Event::BuildFinished { sha, outcome }).await {
                tracing::error!("failed to send BuildFinished: {}", e);
            }
        });

        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{BuildAdapter, BuildError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rw_core::{BuildOutcome, Clock, Event, FakeClock, Ref, Sha};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// One recorded `start_build` invocation.
    #[derive(Debug, Clone)]
    pub struct RecordedBuild {
        pub sha: Sha,
        pub ref_name: String,
        pub cmd: String,
    }

    struct PendingCompletion {
        sha: Sha,
        due: Instant,
        cancel: CancellationToken,
    }

    struct FakeBuildState {
        duration: Duration,
        fail_shas: HashSet<Sha>,
        started: Vec<RecordedBuild>,
        pending: Vec<PendingCompletion>,
    }

    /// Builder whose activities run on virtual time.
    ///
    /// `start_build` records the invocation and schedules a completion at
    /// `clock.now() + duration`. The test harness collects due completions
    /// with [`take_due`](Self::take_due) and feeds them to the monitor, which
    /// is how fake builds "take" virtual time.
    #[derive(Clone)]
    pub struct FakeBuildAdapter {
        clock: FakeClock,
        state: Arc<Mutex<FakeBuildState>>,
    }

    impl FakeBuildAdapter {
        /// Builds complete instantaneously (zero virtual duration).
        pub fn new(clock: FakeClock) -> Self {
            Self::with_duration(clock, Duration::ZERO)
        }

        /// Builds complete after `duration` of virtual time.
        pub fn with_duration(clock: FakeClock, duration: Duration) -> Self {
            Self {
                clock,
                state: Arc::new(Mutex::new(FakeBuildState {
                    duration,
                    fail_shas: HashSet::new(),
                    started: Vec::new(),
                    pending: Vec::new(),
                })),
            }
        }

        /// Make the build for `sha` finish with a failure outcome.
        pub fn set_failing(&self, sha: Sha) {
            self.state.lock().fail_shas.insert(sha);
        }

        /// Total `start_build` invocations so far.
        pub fn build_count(&self) -> usize {
            self.state.lock().started.len()
        }

        /// All recorded invocations, in launch order.
        pub fn started(&self) -> Vec<RecordedBuild> {
            self.state.lock().started.clone()
        }

        /// Earliest pending completion deadline, cancelled activities
        /// included (their acknowledgment is due immediately).
        pub fn next_completion_at(&self) -> Option<Instant> {
            let now = self.clock.now();
            let state = self.state.lock();
            state
                .pending
                .iter()
                .map(|p| if p.cancel.is_cancelled() { now } else { p.due })
                .min()
        }

        /// Remove and return the terminal events due at `now`: completions
        /// whose virtual deadline passed, plus acknowledgments for builds
        /// that were cancelled mid-flight.
        pub fn take_due(&self, now: Instant) -> Vec<Event> {
            let mut state = self.state.lock();
            let FakeBuildState { fail_shas, pending, .. } = &mut *state;
            let mut due = Vec::new();
            pending.retain(|p| {
                if p.cancel.is_cancelled() {
                    due.push(Event::BuildFinished {
                        sha: p.sha.clone(),
                        outcome: BuildOutcome::Cancelled,
                    });
                    false
                } else if p.due <= now {
                    let outcome = if fail_shas.contains(&p.sha) {
                        BuildOutcome::Failed { exit_code: Some(1) }
                    } else {
                        BuildOutcome::Completed
                    };
                    due.push(Event::BuildFinished { sha: p.sha.clone(), outcome });
                    false
                } else {
                    true
                }
            });
            due
        }
    }

    #[async_trait]
    impl BuildAdapter for FakeBuildAdapter {
        async fn start_build(
            &self,
            cmd: &str,
            r: &Ref,
            cancel: CancellationToken,
            _event_tx: mpsc::Sender<Event>,
        ) -> Result<(), BuildError> {
            let mut state = self.state.lock();
            state.started.push(RecordedBuild {
                sha: r.sha().clone(),
                ref_name: r.name.clone(),
                cmd: cmd.to_string(),
            });
            let due = self.clock.now() + state.duration;
            state.pending.push(PendingCompletion { sha: r.sha().clone(), due, cancel });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBuildAdapter, RecordedBuild};

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
