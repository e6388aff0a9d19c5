// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::seeded_store;
use sui_core::test_support;
use sui_core::{ScheduleId, TaskId, TaskStatus};

fn insert_pending(store: &crate::Store, id: &str) -> TaskId {
    store
        .insert_task(&test_support::pending_task(id, "p-1", "s-1"))
        .unwrap();
    TaskId::new(id)
}

#[test]
fn insert_and_fetch_round_trip() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    let task = store.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.items_count, 0);
    assert!(task.schedule_id.is_none());
}

#[test]
fn pending_to_running_stamps_started_at() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");

    assert!(store.mark_task_running(&id, 5_000).unwrap());
    let task = store.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.started_at_ms, Some(5_000));

    // Already running; the guard refuses a second transition.
    assert!(!store.mark_task_running(&id, 6_000).unwrap());
}

#[test]
fn finish_sets_terminal_state_exactly_once() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    store.mark_task_running(&id, 5_000).unwrap();

    assert!(store
        .finish_task(&id, TaskStatus::Finished, 9_000, None)
        .unwrap());
    let task = store.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.finished_at_ms, Some(9_000));

    // Terminal states are sticky.
    assert!(!store
        .finish_task(&id, TaskStatus::Failed, 10_000, Some("late"))
        .unwrap());
    assert_eq!(store.task(&id).unwrap().status, TaskStatus::Finished);
}

#[test]
fn spawn_failure_fails_a_pending_task() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");

    assert!(store
        .finish_task(&id, TaskStatus::Failed, 6_000, Some("spawn: no such file"))
        .unwrap());
    let task = store.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("spawn: no such file"));
}

#[test]
fn repair_moves_failed_to_finished() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    store.mark_task_running(&id, 5_000).unwrap();
    store
        .finish_task(&id, TaskStatus::Failed, 9_000, Some("exit code 1"))
        .unwrap();

    assert!(store.repair_task_finished(&id).unwrap());
    let task = store.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Finished);
    assert!(task.error_message.is_none());

    // Never the reverse: a second repair is a no-op.
    assert!(!store.repair_task_finished(&id).unwrap());
}

#[test]
fn conflict_gate_sees_pending_and_recent_running() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    let sch = ScheduleId::new("sch-1");

    assert!(!store.has_recent_active_for_schedule(&sch, 0).unwrap());

    let mut task = test_support::pending_task("t-1", "p-1", "s-1");
    task.schedule_id = Some(sch.clone());
    store.insert_task(&task).unwrap();
    // Pending always gates, regardless of window.
    assert!(store
        .has_recent_active_for_schedule(&sch, 1_000_000)
        .unwrap());

    store.mark_task_running(&TaskId::new("t-1"), 10_000).unwrap();
    // Running gates only inside the window.
    assert!(store.has_recent_active_for_schedule(&sch, 9_000).unwrap());
    assert!(!store.has_recent_active_for_schedule(&sch, 11_000).unwrap());

    store
        .finish_task(&TaskId::new("t-1"), TaskStatus::Finished, 20_000, None)
        .unwrap();
    assert!(!store.has_recent_active_for_schedule(&sch, 0).unwrap());
}

#[test]
fn stuck_scan_finds_old_running_tasks() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    store.mark_task_running(&id, 1_000).unwrap();
    let fresh = insert_pending(&store, "t-2");
    store.mark_task_running(&fresh, 100_000).unwrap();

    let stuck = store.running_tasks_started_before(50_000).unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].id, "t-1");
}

#[test]
fn terminal_window_scan() {
    let store = seeded_store();
    let old = insert_pending(&store, "t-1");
    store.mark_task_running(&old, 1_000).unwrap();
    store
        .finish_task(&old, TaskStatus::Finished, 2_000, None)
        .unwrap();
    let recent = insert_pending(&store, "t-2");
    store.mark_task_running(&recent, 90_000).unwrap();
    store
        .finish_task(&recent, TaskStatus::Failed, 95_000, Some("boom"))
        .unwrap();

    let in_window = store.terminal_tasks_since(50_000).unwrap();
    assert_eq!(in_window.len(), 1);
    assert_eq!(in_window[0].id, "t-2");
}

#[test]
fn counters_update() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    store.set_task_items_count(&id, 7).unwrap();
    assert_eq!(store.task(&id).unwrap().items_count, 7);

    store.set_task_counts(&id, 9, 31, 2).unwrap();
    let task = store.task(&id).unwrap();
    assert_eq!(task.items_count, 9);
    assert_eq!(task.requests_count, 31);
    assert_eq!(task.error_count, 2);
}

#[test]
fn output_path_round_trips() {
    let store = seeded_store();
    let id = insert_pending(&store, "t-1");
    store
        .set_task_output_path(&id, std::path::Path::new("/data/p1/results_t-1.jsonl"))
        .unwrap();
    assert_eq!(
        store.task(&id).unwrap().output_path,
        Some(std::path::PathBuf::from("/data/p1/results_t-1.jsonl"))
    );
}
