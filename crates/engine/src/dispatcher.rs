// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency build dispatch.
//!
//! The dispatcher owns the schedule state the core invariants are stated
//! over: the seen set, the FIFO pending queue, and the active map. All three
//! live under one mutex because the invariants tie them together (every
//! pending or active SHA is seen; no SHA is pending and active at once).

use crate::error::ConfigError;
use parking_lot::Mutex;
use rw_adapters::BuildAdapter;
use rw_core::{diff, BuildOutcome, Event, Ref, RefDiff, SeenCommits, Sha};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A running build: the ref that justified it plus its cancellation handle.
#[derive(Debug)]
struct ActiveBuild {
    ref_name: String,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct DispatchState {
    seen: SeenCommits,
    queue: VecDeque<Ref>,
    active: HashMap<Sha, ActiveBuild>,
    shut_down: bool,
    launched: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

/// Point-in-time dispatch counters.
///
/// The terminal counters are monotone; `running + queued` is instantaneous.
/// Whenever `running == 0`, `completed + failed + cancelled == launched`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub launched: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub running: usize,
    pub queued: usize,
}

/// Queues build submissions and runs at most `max_concurrent` at once, FIFO.
pub struct BuildDispatcher<B: BuildAdapter> {
    builder: B,
    cmd: String,
    max_concurrent: usize,
    state: Arc<Mutex<DispatchState>>,
    event_tx: mpsc::Sender<Event>,
}

impl<B: BuildAdapter> std::fmt::Debug for BuildDispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildDispatcher")
            .field("cmd", &self.cmd)
            .field("max_concurrent", &self.max_concurrent)
            .field("state", &self.state)
            .finish()
    }
}

impl<B: BuildAdapter> BuildDispatcher<B> {
    pub fn new(
        builder: B,
        cmd: impl Into<String>,
        max_concurrent: usize,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<Self, ConfigError> {
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(Self {
            builder,
            cmd: cmd.into(),
            max_concurrent,
            state: Arc::new(Mutex::new(DispatchState::default())),
            event_tx,
        })
    }

    /// Bulk-load SHAs into the seen set. Only called before the first poll.
    pub fn seed(&self, shas: impl IntoIterator<Item = Sha>) {
        self.state.lock().seen.add_all(shas);
    }

    /// Diff a snapshot against the seen set and the running builds, under
    /// the same lock the schedule state mutates under.
    pub fn diff_snapshot(&self, snapshot: &[Ref]) -> RefDiff {
        let state = self.state.lock();
        let running: HashSet<Sha> = state.active.keys().cloned().collect();
        diff(snapshot, &state.seen, &running)
    }

    /// Submit a build for `r`. The SHA is marked seen immediately; the build
    /// starts now if a slot is free, otherwise it queues FIFO.
    pub async fn submit(&self, r: &Ref) {
        {
            let mut state = self.state.lock();
            if state.shut_down {
                tracing::debug!(sha = r.sha().short(), "dispatcher shut down, refusing submit");
                return;
            }
            if state.active.contains_key(r.sha())
                || state.queue.iter().any(|q| q.sha() == r.sha())
            {
                tracing::debug!(sha = r.sha().short(), "duplicate submit ignored");
                return;
            }
            state.seen.add(r.sha().clone());
            state.queue.push_back(r.clone());
        }
        self.pump().await;
    }

    /// Cancel the build for `sha`: a queued build is dropped before it ever
    /// starts, a running build has its cancellation handle signalled and is
    /// treated as terminated immediately. Unknown SHAs are a no-op.
    pub async fn cancel(&self, sha: &Sha) {
        {
            let mut state = self.state.lock();
            if let Some(pos) = state.queue.iter().position(|r| r.sha() == sha) {
                state.queue.remove(pos);
                tracing::debug!(sha = sha.short(), "dropped queued build");
                return;
            }
            match state.active.remove(sha) {
                Some(active) => {
                    active.cancel.cancel();
                    state.cancelled += 1;
                    tracing::info!(
                        sha = sha.short(),
                        ref_name = %active.ref_name,
                        "cancelled running build"
                    );
                }
                None => return,
            }
        }
        self.pump().await;
    }

    /// Record a terminal outcome reported by the builder and promote queued
    /// work into the freed slot.
    pub async fn on_finished(&self, sha: &Sha, outcome: BuildOutcome) {
        {
            let mut state = self.state.lock();
            match state.active.remove(sha) {
                None => {
                    // Normal after a cancellation: the activity acknowledges
                    // late, after the record is already gone.
                    tracing::debug!(sha = sha.short(), %outcome, "completion for untracked build");
                    return;
                }
                Some(active) => match outcome {
                    BuildOutcome::Completed => {
                        state.completed += 1;
                        tracing::info!(
                            sha = sha.short(),
                            ref_name = %active.ref_name,
                            "build completed"
                        );
                    }
                    BuildOutcome::Failed { exit_code } => {
                        state.failed += 1;
                        tracing::warn!(
                            sha = sha.short(),
                            ref_name = %active.ref_name,
                            exit_code = exit_code.unwrap_or(-1),
                            "build failed"
                        );
                    }
                    BuildOutcome::Cancelled => {
                        state.cancelled += 1;
                        tracing::debug!(sha = sha.short(), "build acknowledged cancellation");
                    }
                },
            }
        }
        self.pump().await;
    }

    /// SHAs currently running.
    pub fn active_shas(&self) -> HashSet<Sha> {
        self.state.lock().active.keys().cloned().collect()
    }

    pub fn stats(&self) -> DispatchStats {
        let state = self.state.lock();
        DispatchStats {
            launched: state.launched,
            completed: state.completed,
            failed: state.failed,
            cancelled: state.cancelled,
            running: state.active.len(),
            queued: state.queue.len(),
        }
    }

    /// Cancel everything, queued and running, and refuse new submissions.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        state.queue.clear();
        let drained: Vec<(Sha, ActiveBuild)> = state.active.drain().collect();
        state.cancelled += drained.len() as u64;
        for (sha, active) in drained {
            active.cancel.cancel();
            tracing::debug!(sha = sha.short(), "cancelled build at shutdown");
        }
    }

    /// Move queued builds into free slots, FIFO, and start them.
    ///
    /// A launch failure tears the slot back down (the SHA stays seen) and
    /// the loop continues with the next queued build.
    async fn pump(&self) {
        loop {
            let next = {
                let mut state = self.state.lock();
                if state.shut_down || state.active.len() >= self.max_concurrent {
                    None
                } else {
                    match state.queue.pop_front() {
                        Some(r) => {
                            let cancel = CancellationToken::new();
                            state.active.insert(
                                r.sha().clone(),
                                ActiveBuild { ref_name: r.name.clone(), cancel: cancel.clone() },
                            );
                            state.launched += 1;
                            Some((r, cancel))
                        }
                        None => None,
                    }
                }
            };
            let Some((r, cancel)) = next else { break };

            tracing::info!(sha = r.sha().short(), ref_name = %r.name, "launching build");
            let started = self
                .builder
                .start_build(&self.cmd, &r, cancel, self.event_tx.clone())
                .await;
            if let Err(e) = started {
                tracing::error!(sha = r.sha().short(), error = %e, "build launch failed");
                let mut state = self.state.lock();
                state.active.remove(r.sha());
                state.failed += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
