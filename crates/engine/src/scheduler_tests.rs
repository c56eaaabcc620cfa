// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rw_core::{Clock, FakeClock};

#[test]
fn scheduler_timer_lifecycle() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::poll(), Duration::from_secs(10), clock.now());
    assert!(scheduler.has_timers());
    assert!(scheduler.next_deadline().is_some());

    // Timer hasn't fired yet
    clock.advance(Duration::from_secs(5));
    let events = scheduler.fired_timers(clock.now());
    assert!(events.is_empty());
    assert!(scheduler.has_timers());

    // Timer fires
    clock.advance(Duration::from_secs(10));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::TimerFired { id } if id.is_poll()));
    assert!(!scheduler.has_timers());
}

#[test]
fn scheduler_cancel_timer() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::poll(), Duration::from_secs(10), clock.now());
    scheduler.cancel_timer(&TimerId::poll());

    clock.advance(Duration::from_secs(15));
    let events = scheduler.fired_timers(clock.now());
    assert!(events.is_empty());
}

#[test]
fn scheduler_setting_same_id_replaces_deadline() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::poll(), Duration::from_secs(10), clock.now());
    scheduler.set_timer(TimerId::poll(), Duration::from_secs(60), clock.now());

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.fired_timers(clock.now()).is_empty());
    clock.advance(Duration::from_secs(50));
    assert_eq!(scheduler.fired_timers(clock.now()).len(), 1);
}

#[test]
fn scheduler_fires_multiple_timers_in_deadline_order() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::new("later"), Duration::from_secs(20), clock.now());
    scheduler.set_timer(TimerId::new("sooner"), Duration::from_secs(10), clock.now());

    clock.advance(Duration::from_secs(30));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::TimerFired { id } if id.as_str() == "sooner"));
    assert!(matches!(&events[1], Event::TimerFired { id } if id.as_str() == "later"));
}
