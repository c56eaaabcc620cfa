// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor loop tying fetcher, diff, and dispatcher together.
//!
//! Every poll interval the monitor requests a snapshot from the fetcher (at
//! most one request outstanding; a tick that lands mid-fetch is skipped, not
//! queued). Each resolved snapshot is diffed against the schedule state:
//! unseen SHAs are submitted, running builds whose SHA left the snapshot are
//! cancelled. All state transitions happen on the event loop that calls
//! [`Monitor::handle_event`].

use crate::dispatcher::{BuildDispatcher, DispatchStats};
use crate::error::{ConfigError, MonitorError};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use rw_adapters::{BuildAdapter, RefFetcher};
use rw_core::{Clock, Event, Ref, Sha, TimerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Monitor configuration, validated at construction.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between poll ticks. Must be positive.
    pub poll_interval: Duration,
    /// Build slots. Must be at least 1.
    pub max_concurrent: usize,
    /// Opaque command handed to the builder for every ref.
    pub build_cmd: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Polling,
    Stopped,
}

rw_core::simple_display! {
    Phase {
        Idle => "idle",
        Polling => "polling",
        Stopped => "stopped",
    }
}

/// The build monitor: periodic polling, snapshot diffing, dispatch.
pub struct Monitor<F, B, C>
where
    F: RefFetcher,
    B: BuildAdapter,
    C: Clock,
{
    fetcher: F,
    dispatcher: BuildDispatcher<B>,
    scheduler: Arc<Mutex<Scheduler>>,
    clock: C,
    poll_interval: Duration,
    phase: Mutex<Phase>,
    fetch_in_flight: AtomicBool,
    event_tx: mpsc::Sender<Event>,
}

impl<F, B, C> Monitor<F, B, C>
where
    F: RefFetcher,
    B: BuildAdapter,
    C: Clock,
{
    /// Create a monitor. `event_tx` is the channel adapters report back on;
    /// its receiving half belongs to the caller's event loop.
    pub fn new(
        fetcher: F,
        builder: B,
        clock: C,
        config: MonitorConfig,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<Self, ConfigError> {
        if config.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }
        let dispatcher = BuildDispatcher::new(
            builder,
            config.build_cmd,
            config.max_concurrent,
            event_tx.clone(),
        )?;
        Ok(Self {
            fetcher,
            dispatcher,
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            clock,
            poll_interval: config.poll_interval,
            phase: Mutex::new(Phase::Idle),
            fetch_in_flight: AtomicBool::new(false),
            event_tx,
        })
    }

    /// Preload SHAs that should never be built, e.g. history from a prior
    /// run. Rejected once the monitor has started.
    pub fn seed_seen(&self, shas: impl IntoIterator<Item = Sha>) -> Result<(), MonitorError> {
        if *self.phase.lock() != Phase::Idle {
            return Err(MonitorError::SeedAfterStart);
        }
        self.dispatcher.seed(shas);
        Ok(())
    }

    /// Enter the polling phase. The first poll fires one full interval from
    /// now, not immediately. Idempotent.
    pub fn start(&self) {
        let mut phase = self.phase.lock();
        if *phase != Phase::Idle {
            tracing::debug!(phase = %*phase, "start ignored");
            return;
        }
        *phase = Phase::Polling;
        self.scheduler.lock().set_timer(TimerId::poll(), self.poll_interval, self.clock.now());
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "monitor started");
    }

    /// Stop polling and cancel all outstanding work. Idempotent.
    pub fn dispose(&self) {
        let mut phase = self.phase.lock();
        if *phase == Phase::Stopped {
            return;
        }
        *phase = Phase::Stopped;
        self.scheduler.lock().cancel_timer(&TimerId::poll());
        self.dispatcher.shutdown();
        tracing::info!("monitor stopped");
    }

    pub fn is_stopped(&self) -> bool {
        *self.phase.lock() == Phase::Stopped
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// SHAs with a running build.
    pub fn active_shas(&self) -> std::collections::HashSet<Sha> {
        self.dispatcher.active_shas()
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Collect timers due at the clock's current reading.
    pub fn fired_timers(&self) -> Vec<Event> {
        self.scheduler.lock().fired_timers(self.clock.now())
    }

    /// Process one event. All schedule-state transitions funnel through
    /// here, on whichever task owns the event loop.
    pub async fn handle_event(&self, event: Event) {
        if self.is_stopped() {
            tracing::debug!(event = %event.log_summary(), "stopped, event dropped");
            return;
        }
        match event {
            Event::TimerFired { id } if id.is_poll() => self.handle_poll_tick(),
            Event::TimerFired { id } => {
                tracing::warn!(timer = %id, "unknown timer fired");
            }
            Event::RefsFetched { refs } => self.handle_snapshot(refs).await,
            Event::RefsFetchFailed { error } => {
                self.fetch_in_flight.store(false, Ordering::SeqCst);
                tracing::warn!(%error, "ref fetch failed, skipping tick");
            }
            Event::BuildFinished { sha, outcome } => {
                self.dispatcher.on_finished(&sha, outcome).await;
            }
        }
    }

    fn handle_poll_tick(&self) {
        // Re-arm first so polling survives anything the tick itself does.
        self.scheduler.lock().set_timer(TimerId::poll(), self.poll_interval, self.clock.now());

        if self.fetch_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("previous fetch still in flight, skipping tick");
            return;
        }

        // Read the fetcher fresh each tick; its response may change between
        // polls. The request runs off-loop and reports back as an event.
        let fetcher = self.fetcher.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match fetcher.fetch_refs().await {
                Ok(refs) => Event::RefsFetched { refs },
                Err(e) => Event::RefsFetchFailed { error: e.to_string() },
            };
            if let Err(e) = event_tx.send(event).await {
                tracing::error!(error = %e, "failed to deliver fetch result");
            }
        });
    }

    async fn handle_snapshot(&self, refs: Vec<Ref>) {
        self.fetch_in_flight.store(false, Ordering::SeqCst);

        let d = self.dispatcher.diff_snapshot(&refs);
        if !d.is_empty() {
            tracing::info!(
                refs = refs.len(),
                launch = d.to_launch.len(),
                cancel = d.to_cancel.len(),
                "snapshot diff"
            );
        }

        for r in &d.to_launch {
            self.dispatcher.submit(r).await;
        }
        for sha in &d.to_cancel {
            self.dispatcher.cancel(sha).await;
        }

        let stats = self.dispatcher.stats();
        tracing::debug!(
            running = stats.running,
            queued = stats.queued,
            completed = stats.completed,
            "snapshot processed"
        );
    }

    /// Drive the monitor until `shutdown` trips or the event channel closes.
    ///
    /// Sleeps until the next scheduler deadline, fires due timers, and
    /// processes adapter events as they arrive.
    pub async fn run(&self, mut event_rx: mpsc::Receiver<Event>, shutdown: CancellationToken) {
        self.start();
        loop {
            let deadline = self.scheduler.lock().next_deadline();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                maybe = event_rx.recv() => match maybe {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    for event in self.fired_timers() {
                        self.handle_event(event).await;
                    }
                }
            }
        }
        self.dispose();
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "monitor_tests/mod.rs"]
mod tests;
