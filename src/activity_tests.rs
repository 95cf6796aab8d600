// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn starts_in_prompt_tier_with_no_activity() {
    let monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    assert_eq!(monitor.current_tier(), ActivityTier::Prompt);
}

#[test]
fn output_transitions_to_busy() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let now = Instant::now();
    let (event, trigger, confidence) = monitor.on_output(now).unwrap();
    assert_eq!(event, StateEvent::Busy);
    assert_eq!(trigger, Trigger::Output);
    assert_eq!(confidence, 1.0);
    assert_eq!(monitor.current_tier(), ActivityTier::Busy);
}

#[test]
fn repeated_output_within_busy_tier_emits_nothing() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let now = Instant::now();
    assert!(monitor.on_output(now).is_some());
    assert!(monitor.on_output(now + Duration::from_millis(10)).is_none());
}

#[test]
fn poll_before_debounce_elapses_emits_nothing() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let now = Instant::now();
    monitor.on_output(now);
    assert!(monitor.poll(now + Duration::from_millis(100)).is_none());
}

#[test]
fn poll_after_debounce_elapses_transitions_to_prompt() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let now = Instant::now();
    monitor.on_output(now);
    let (event, trigger, _) = monitor.poll(now + DEFAULT_DEBOUNCE + Duration::from_millis(1)).unwrap();
    assert_eq!(event, StateEvent::Prompt);
    assert_eq!(trigger, Trigger::Activity);
    assert_eq!(monitor.current_tier(), ActivityTier::Prompt);
}

#[test]
fn input_transitions_busy_with_input_trigger() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let (event, trigger, _) = monitor.on_input(Instant::now()).unwrap();
    assert_eq!(event, StateEvent::Busy);
    assert_eq!(trigger, Trigger::Input);
}

#[test]
fn exit_always_emits_regardless_of_current_tier() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    let (event, _, confidence) = monitor.on_exit(Some(0));
    assert_eq!(event, StateEvent::Exit { code: Some(0) });
    assert_eq!(confidence, 1.0);
    assert_eq!(monitor.current_tier(), ActivityTier::Exited);
}

#[test]
fn poll_after_exit_emits_nothing() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    monitor.on_exit(Some(1));
    assert!(monitor.poll(Instant::now() + Duration::from_secs(10)).is_none());
}

#[test]
fn poll_with_no_prior_activity_emits_nothing() {
    let mut monitor = ActivityMonitor::new(DEFAULT_DEBOUNCE);
    assert!(monitor.poll(Instant::now()).is_none());
}
