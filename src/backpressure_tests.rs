// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn enqueue_zero_length_is_a_no_op() {
    let mut mgr = BackpressureManager::new();
    assert!(mgr.enqueue("t1", vec![]));
    assert_eq!(mgr.pending_bytes("t1"), 0);
    assert_eq!(mgr.total_pending_bytes(), 0);
}

#[test]
fn enqueue_at_exact_per_terminal_boundary_succeeds() {
    let mut mgr = BackpressureManager::new();
    let data = vec![0u8; MAX_PENDING_BYTES_PER_TERMINAL];
    assert!(mgr.enqueue("t1", data));
    assert_eq!(mgr.pending_bytes("t1"), MAX_PENDING_BYTES_PER_TERMINAL);
}

#[test]
fn enqueue_one_byte_over_per_terminal_boundary_fails() {
    let mut mgr = BackpressureManager::new();
    assert!(mgr.enqueue("t1", vec![0u8; MAX_PENDING_BYTES_PER_TERMINAL - 100]));
    assert!(!mgr.enqueue("t1", vec![0u8; 200]));
    assert_eq!(mgr.pending_bytes("t1"), MAX_PENDING_BYTES_PER_TERMINAL - 100);

    // A subsequent smaller enqueue that fits still succeeds.
    assert!(mgr.enqueue("t1", vec![0u8; 50]));
    assert_eq!(mgr.pending_bytes("t1"), MAX_PENDING_BYTES_PER_TERMINAL - 50);
}

#[test]
fn global_budget_is_enforced_across_terminals() {
    let mut mgr = BackpressureManager::new();
    assert!(mgr.enqueue("t1", vec![0u8; MAX_TOTAL_PENDING_BYTES - 100]));
    assert!(!mgr.enqueue("t2", vec![0u8; 200]));
    assert_eq!(mgr.total_pending_bytes(), MAX_TOTAL_PENDING_BYTES - 100);
}

#[test]
fn consume_decrements_both_counters() {
    let mut mgr = BackpressureManager::new();
    mgr.enqueue("t1", vec![0u8; 100]);
    mgr.consume("t1", 40);
    assert_eq!(mgr.pending_bytes("t1"), 60);
    assert_eq!(mgr.total_pending_bytes(), 60);
}

#[test]
fn consume_clamps_at_zero() {
    let mut mgr = BackpressureManager::new();
    mgr.enqueue("t1", vec![0u8; 10]);
    mgr.consume("t1", 1000);
    assert_eq!(mgr.pending_bytes("t1"), 0);
    assert_eq!(mgr.total_pending_bytes(), 0);
}

#[test]
fn pause_emits_pause_action_and_status_once() {
    let mut mgr = BackpressureManager::new();
    let now = Instant::now();
    let actions = mgr.pause("t1", now);
    assert!(actions.contains(&BackpressureAction::PausePty));
    assert!(actions
        .iter()
        .any(|a| matches!(a, BackpressureAction::EmitStatus { status: "paused-backpressure", .. })));

    // Repeated pause doesn't re-emit the same status (dedup, §3/§8 invariant 4).
    let actions2 = mgr.pause("t1", now);
    assert!(!actions2
        .iter()
        .any(|a| matches!(a, BackpressureAction::EmitStatus { .. })));
}

#[test]
fn check_pause_resumes_when_budget_recovers() {
    let mut mgr = BackpressureManager::new();
    let now = Instant::now();
    mgr.enqueue("t1", vec![0u8; MAX_PENDING_BYTES_PER_TERMINAL]);
    mgr.pause("t1", now);
    mgr.consume("t1", MAX_PENDING_BYTES_PER_TERMINAL);

    let actions = mgr.check_pause("t1", now + Duration::from_secs(1), None);
    assert!(actions.contains(&BackpressureAction::ResumePty));
    assert!(actions
        .iter()
        .any(|a| matches!(a, BackpressureAction::EmitStatus { status: "running", .. })));
}

#[test]
fn check_pause_suspends_after_safety_timeout() {
    let mut mgr = BackpressureManager::new();
    let now = Instant::now();
    mgr.enqueue("t1", vec![0u8; MAX_PENDING_BYTES_PER_TERMINAL]);
    mgr.pause("t1", now);

    let actions = mgr.check_pause("t1", now + BACKPRESSURE_SAFETY_TIMEOUT + Duration::from_secs(1), Some(2));
    assert!(actions
        .iter()
        .any(|a| matches!(a, BackpressureAction::EmitStatus { status: "suspended", .. })));
    assert!(actions.iter().any(|a| matches!(
        a,
        BackpressureAction::EmitMetric(m) if m.metric_type == crate::event::ReliabilityMetricType::Suspend
    )));
    assert_eq!(mgr.pending_bytes("t1"), 0);
    assert_eq!(mgr.total_pending_bytes(), 0);
}

#[test]
fn suspend_drops_pending_segments_for_that_terminal_only() {
    let mut mgr = BackpressureManager::new();
    mgr.enqueue("t1", vec![0u8; 500]);
    mgr.enqueue("t2", vec![0u8; 300]);
    mgr.suspend("t1", None);
    assert_eq!(mgr.pending_bytes("t1"), 0);
    assert_eq!(mgr.pending_bytes("t2"), 300);
    assert_eq!(mgr.total_pending_bytes(), 300);
}

#[test]
fn cleanup_removes_terminal_and_its_contribution_to_the_global_total() {
    let mut mgr = BackpressureManager::new();
    mgr.enqueue("t1", vec![0u8; 100]);
    mgr.enqueue("t2", vec![0u8; 50]);
    mgr.cleanup("t1");
    assert_eq!(mgr.pending_bytes("t1"), 0);
    assert_eq!(mgr.total_pending_bytes(), 50);
}

#[test]
fn dispose_clears_everything() {
    let mut mgr = BackpressureManager::new();
    mgr.enqueue("t1", vec![0u8; 100]);
    mgr.dispose();
    assert_eq!(mgr.total_pending_bytes(), 0);
    assert_eq!(mgr.pending_bytes("t1"), 0);
}
