// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::seeded_store;
use crate::{Store, StoreError};
use sui_core::test_support;
use sui_core::{ProjectId, SpiderId, TaskStatus};

#[test]
fn insert_and_fetch_round_trip() {
    let store = seeded_store();
    let project = store.project(&ProjectId::new("p-1")).unwrap();
    assert_eq!(project.name, "p-1");
    assert_eq!(project.path.to_string_lossy(), "p1");
    assert!(project.persist_results);
}

#[test]
fn missing_project_is_not_found() {
    let store = Store::open_memory().unwrap();
    let err = store.project(&ProjectId::new("nope")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn duplicate_path_is_rejected() {
    let store = seeded_store();
    let mut other = test_support::project("p-2", "p1");
    other.name = "different".to_string();
    let err = store.insert_project(&other).unwrap_err();
    assert!(matches!(err, StoreError::Permanent(_)));
}

#[test]
fn duplicate_name_owner_is_rejected() {
    let store = seeded_store();
    let mut other = test_support::project("p-2", "elsewhere");
    other.name = "p-1".to_string();
    let err = store.insert_project(&other).unwrap_err();
    assert!(matches!(err, StoreError::Permanent(_)));
}

#[test]
fn delete_refused_with_active_schedule() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "* * * * *"))
        .unwrap();
    let err = store.delete_project(&ProjectId::new("p-1")).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn delete_refused_with_running_task() {
    let store = seeded_store();
    let mut task = test_support::pending_task("t-1", "p-1", "s-1");
    task.status = TaskStatus::Running;
    task.started_at_ms = Some(1);
    store.insert_task(&task).unwrap();
    let err = store.delete_project(&ProjectId::new("p-1")).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn delete_succeeds_when_idle() {
    let store = seeded_store();
    store.delete_project(&ProjectId::new("p-1")).unwrap();
    assert!(store.project(&ProjectId::new("p-1")).is_err());
    assert!(store.spider(&SpiderId::new("s-1")).is_err());
}

#[test]
fn spider_delete_cascades_schedules_only() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "* * * * *"))
        .unwrap();
    store.insert_task(&test_support::pending_task("t-1", "p-1", "s-1")).unwrap();

    store.delete_spider(&SpiderId::new("s-1")).unwrap();

    assert!(store.schedule(&sui_core::ScheduleId::new("sch-1")).is_err());
    // Historical tasks survive.
    assert!(store.task(&sui_core::TaskId::new("t-1")).is_ok());
}
