// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn snapshot(sequence: u64, lines: &[&str]) -> ScreenSnapshot {
    ScreenSnapshot {
        lines: lines.iter().map(|s| s.to_string()).collect(),
        cols: 80,
        rows: lines.len() as u16,
        alt_screen: false,
        cursor: crate::screen::CursorPosition { row: 0, col: 0 },
        sequence,
    }
}

#[tokio::test]
async fn first_snapshot_produces_one_entry_per_nonempty_line() {
    let service = ProjectionService::new();
    let snap = snapshot(1, &["hello", "", "world"]);
    let result = service.get_snapshot_async("t1", 1000, || Some(snap.clone())).await;
    assert_eq!(result, Some(snap));

    let (latest, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(latest, 1);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].line, "hello");
    assert_eq!(entries[1].line, "world");
}

#[tokio::test]
async fn stale_snapshot_sequence_is_dropped() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(5, &["a"]))).await;
    let (latest_before, entries_before) = service.get_clean_log("t1", None, None).await;

    // Same sequence number again: stale, ignored even though content differs.
    service.get_snapshot_async("t1", 1100, || Some(snapshot(5, &["b"]))).await;
    let (latest_after, entries_after) = service.get_clean_log("t1", None, None).await;

    assert_eq!(latest_before, latest_after);
    assert_eq!(entries_before, entries_after);
}

#[tokio::test]
async fn spinner_glyph_churn_within_window_suppressed() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["Loading |"]))).await;
    service.get_snapshot_async("t1", 1100, || Some(snapshot(2, &["Loading /"]))).await;

    let (_, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].line, "Loading |");
}

#[tokio::test]
async fn spinner_churn_outside_window_is_not_suppressed() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["Loading |"]))).await;
    service.get_snapshot_async("t1", 2000, || Some(snapshot(2, &["Loading /"]))).await;

    let (_, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn prefix_change_is_not_spinner_noise() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["Loading |"]))).await;
    service.get_snapshot_async("t1", 1100, || Some(snapshot(2, &["Done!"]))).await;

    let (latest, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(entries.len(), 2);
    assert!(latest > 1);
}

#[tokio::test]
async fn get_clean_log_filters_by_since_sequence() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["one", "two"]))).await;
    let (latest, all) = service.get_clean_log("t1", None, None).await;
    assert_eq!(all.len(), 2);

    let (_, since_first) = service.get_clean_log("t1", Some(all[0].sequence), None).await;
    assert_eq!(since_first.len(), 1);
    assert_eq!(since_first[0].line, "two");
    assert_eq!(latest, 1);
}

#[tokio::test]
async fn get_clean_log_respects_limit() {
    let service = ProjectionService::new();
    let lines: Vec<String> = (0..10).map(|i| format!("line-{i}")).collect();
    let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &refs))).await;

    let (_, limited) = service.get_clean_log("t1", None, Some(3)).await;
    assert_eq!(limited.len(), 3);
    assert_eq!(limited.last().unwrap().line, "line-9");
}

#[tokio::test]
async fn failed_snapshot_returns_none_and_ingests_nothing() {
    let service = ProjectionService::new();
    let result: Option<ScreenSnapshot> = service.get_snapshot_async("t1", 1000, || None).await;
    assert!(result.is_none());
    let (latest, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(latest, 0);
    assert!(entries.is_empty());
}

#[tokio::test]
async fn clear_drops_log_state() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["hi"]))).await;
    service.clear("t1").await;
    let (latest, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(latest, 0);
    assert!(entries.is_empty());
}

#[tokio::test]
async fn unchanged_line_does_not_produce_a_new_entry() {
    let service = ProjectionService::new();
    service.get_snapshot_async("t1", 1000, || Some(snapshot(1, &["steady"]))).await;
    service.get_snapshot_async("t1", 1100, || Some(snapshot(2, &["steady"]))).await;
    let (_, entries) = service.get_clean_log("t1", None, None).await;
    assert_eq!(entries.len(), 1);
}
