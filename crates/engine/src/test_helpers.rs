// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test harness for the engine crate.
//!
//! The harness owns the event channel's receiving half and plays the role of
//! the run loop: it advances the fake clock stepwise to each pending
//! deadline — scheduler timers and fake-build completions alike — and
//! synchronously processes everything that becomes due, so a test observes
//! the exact state the monitor would reach at that virtual instant.

use crate::monitor::{Monitor, MonitorConfig};
use rw_adapters::{FakeBuildAdapter, FakeRefFetcher};
use rw_core::{Clock, Event, FakeClock, Ref};
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) type TestMonitor = Monitor<FakeRefFetcher, FakeBuildAdapter, FakeClock>;

pub(crate) struct TestContext {
    pub monitor: TestMonitor,
    pub clock: FakeClock,
    pub fetcher: FakeRefFetcher,
    pub builder: FakeBuildAdapter,
    pub event_rx: mpsc::Receiver<Event>,
}

pub(crate) const POLL: Duration = Duration::from_secs(5);

pub(crate) fn config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: POLL,
        max_concurrent: 2,
        build_cmd: "make build".to_string(),
    }
}

/// Monitor over a fake fetcher returning `refs` and instantaneous builds.
pub(crate) fn setup(refs: Vec<Ref>) -> TestContext {
    setup_with(config(), refs, Duration::ZERO)
}

/// Monitor with explicit config and virtual build duration.
pub(crate) fn setup_with(
    config: MonitorConfig,
    refs: Vec<Ref>,
    build_duration: Duration,
) -> TestContext {
    let clock = FakeClock::new();
    let fetcher = FakeRefFetcher::new(refs);
    let builder = FakeBuildAdapter::with_duration(clock.clone(), build_duration);
    let (event_tx, event_rx) = mpsc::channel(100);
    let monitor =
        Monitor::new(fetcher.clone(), builder.clone(), clock.clone(), config, event_tx).unwrap();
    TestContext { monitor, clock, fetcher, builder, event_rx }
}

impl TestContext {
    /// Process everything pending at the current virtual time: spawned fetch
    /// results on the event channel and build completions already due.
    pub(crate) async fn drain(&mut self) {
        loop {
            tokio::task::yield_now().await;
            let mut progressed = false;
            while let Ok(event) = self.event_rx.try_recv() {
                progressed = true;
                self.monitor.handle_event(event).await;
            }
            for event in self.builder.take_due(self.clock.now()) {
                progressed = true;
                self.monitor.handle_event(event).await;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Advance virtual time by `duration`, firing every timer and build
    /// completion that falls inside the window, in deadline order.
    pub(crate) async fn advance(&mut self, duration: Duration) {
        let target = self.clock.now() + duration;
        self.drain().await;
        loop {
            let next_timer = self.monitor.scheduler().lock().next_deadline();
            let next_build = self.builder.next_completion_at();
            let next = [next_timer, next_build].into_iter().flatten().min();
            let Some(next) = next.filter(|n| *n <= target) else { break };

            let now = self.clock.now();
            if next > now {
                self.clock.advance(next - now);
            }
            for event in self.monitor.fired_timers() {
                self.monitor.handle_event(event).await;
            }
            self.drain().await;
        }
        let now = self.clock.now();
        if target > now {
            self.clock.advance(target - now);
        }
    }
}
