// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn idle_to_working_on_busy() {
    let t = transition(AgentState::Idle, 10, 10, StateEvent::Busy, Trigger::Activity, 1.0).unwrap();
    assert_eq!(t.previous, AgentState::Idle);
    assert_eq!(t.state, AgentState::Working);
}

#[test]
fn working_to_waiting_on_prompt() {
    let t =
        transition(AgentState::Working, 10, 10, StateEvent::Prompt, Trigger::Heuristic, 0.95).unwrap();
    assert_eq!(t.state, AgentState::Waiting);
}

#[test]
fn waiting_to_working_via_input() {
    let t = transition(AgentState::Waiting, 10, 10, StateEvent::Input, Trigger::Input, 1.0).unwrap();
    assert_eq!(t.state, AgentState::Working);
}

#[test]
fn stale_token_is_rejected() {
    let t = transition(AgentState::Waiting, 10, 9, StateEvent::Busy, Trigger::Activity, 1.0);
    assert!(t.is_none());
}

#[test]
fn exit_zero_from_working_completes() {
    let t = transition(
        AgentState::Working,
        10,
        10,
        StateEvent::Exit { code: Some(0) },
        Trigger::Output,
        1.0,
    )
    .unwrap();
    assert_eq!(t.state, AgentState::Completed);
}

#[test]
fn exit_nonzero_from_waiting_fails() {
    let t = transition(
        AgentState::Waiting,
        10,
        10,
        StateEvent::Exit { code: Some(1) },
        Trigger::Output,
        1.0,
    )
    .unwrap();
    assert_eq!(t.state, AgentState::Failed);
}

#[test]
fn exit_with_no_code_fails() {
    let t =
        transition(AgentState::Working, 10, 10, StateEvent::Exit { code: None }, Trigger::Output, 1.0)
            .unwrap();
    assert_eq!(t.state, AgentState::Failed);
}

#[test]
fn error_event_always_fails_regardless_of_current_state() {
    for state in [AgentState::Idle, AgentState::Working, AgentState::Waiting] {
        let t = transition(state, 10, 10, StateEvent::Error, Trigger::Heuristic, 1.0).unwrap();
        assert_eq!(t.state, AgentState::Failed);
    }
}

#[test]
fn terminal_states_accept_no_further_events_except_error() {
    assert!(transition(AgentState::Completed, 10, 10, StateEvent::Busy, Trigger::Activity, 1.0)
        .is_none());
    assert!(transition(AgentState::Failed, 10, 10, StateEvent::Input, Trigger::Input, 1.0).is_none());
}

#[test]
fn no_change_returns_none() {
    assert!(transition(AgentState::Idle, 10, 10, StateEvent::Prompt, Trigger::Activity, 1.0).is_none());
}

#[test]
fn confidence_is_clamped_to_unit_interval() {
    let over = transition(AgentState::Idle, 10, 10, StateEvent::Busy, Trigger::Activity, 1.5).unwrap();
    assert_eq!(over.confidence, 1.0);
    let under =
        transition(AgentState::Idle, 10, 10, StateEvent::Busy, Trigger::Activity, -0.5).unwrap();
    assert_eq!(under.confidence, 0.0);
}

#[test]
fn is_terminal_reflects_completed_and_failed() {
    assert!(AgentState::Completed.is_terminal());
    assert!(AgentState::Failed.is_terminal());
    assert!(!AgentState::Working.is_terminal());
}
