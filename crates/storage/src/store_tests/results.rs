// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::seeded_store;
use serde_json::json;
use sui_core::{Payload, ResultId, ResultRecord, TaskId};

fn record(id: &str, task_id: &str, fingerprint: &str, payload: serde_json::Value) -> ResultRecord {
    ResultRecord {
        id: ResultId::new(id),
        task_id: TaskId::new(task_id),
        url: payload.get("url").and_then(|v| v.as_str()).map(String::from),
        crawl_start_ms: None,
        item_acquired_ms: None,
        payload: Payload::new(payload),
        fingerprint: fingerprint.to_string(),
    }
}

#[test]
fn bulk_insert_and_count() {
    let store = seeded_store();
    let batch: Vec<ResultRecord> = (0..5)
        .map(|i| record(&format!("r-{i}"), "t-1", &format!("fp-{i}"), json!({"i": i})))
        .collect();
    store.insert_results(&batch).unwrap();

    assert_eq!(store.count_results_for_task(&TaskId::new("t-1")).unwrap(), 5);
    assert_eq!(store.count_results_for_task(&TaskId::new("t-2")).unwrap(), 0);
}

#[test]
fn payload_round_trips_preserving_structure() {
    let store = seeded_store();
    let payload = json!({
        "title": "widget",
        "url": "https://example.com/w",
        "tags": ["a", "b"],
        "price": {"amount": 9.5, "currency": "JPY"},
        "in_stock": true,
        "note": null,
    });
    store
        .insert_results(&[record("r-1", "t-1", "fp-1", payload.clone())])
        .unwrap();

    let rows = store.results_for_task(&TaskId::new("t-1")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload.as_value(), &payload);
    assert_eq!(rows[0].url.as_deref(), Some("https://example.com/w"));
}

#[test]
fn fingerprints_warm_up_query() {
    let store = seeded_store();
    store
        .insert_results(&[
            record("r-1", "t-1", "fp-a", json!({"a": 1})),
            record("r-2", "t-1", "fp-b", json!({"b": 2})),
            record("r-3", "t-other", "fp-c", json!({"c": 3})),
        ])
        .unwrap();

    let mut fps = store.fingerprints_for_task(&TaskId::new("t-1")).unwrap();
    fps.sort();
    assert_eq!(fps, vec!["fp-a".to_string(), "fp-b".to_string()]);

    assert!(store.fingerprint_exists(&TaskId::new("t-1"), "fp-a").unwrap());
    assert!(!store.fingerprint_exists(&TaskId::new("t-1"), "fp-c").unwrap());
}

#[test]
fn duplicates_are_storable_and_prunable() {
    // The schema deliberately has no uniqueness on (task_id, fingerprint);
    // the prune keeps the oldest row of each group.
    let store = seeded_store();
    store
        .insert_results(&[
            record("r-1", "t-1", "fp-a", json!({"a": 1})),
            record("r-2", "t-1", "fp-a", json!({"a": 1})),
            record("r-3", "t-1", "fp-a", json!({"a": 1})),
            record("r-4", "t-1", "fp-b", json!({"b": 2})),
        ])
        .unwrap();

    let deleted = store.prune_duplicate_results(&TaskId::new("t-1")).unwrap();
    assert_eq!(deleted, 2);

    let rows = store.results_for_task(&TaskId::new("t-1")).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "r-1");
    assert_eq!(rows[1].id, "r-4");

    // Idempotent: a second prune deletes nothing.
    assert_eq!(store.prune_duplicate_results(&TaskId::new("t-1")).unwrap(), 0);
}

#[test]
fn empty_batch_is_a_no_op() {
    let store = seeded_store();
    store.insert_results(&[]).unwrap();
    assert_eq!(store.count_results_for_task(&TaskId::new("t-1")).unwrap(), 0);
}
