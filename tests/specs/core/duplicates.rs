// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplicate suppression: identical JSON objects share a fingerprint and
//! collapse to one result row.

use crate::prelude::*;
use sui_core::{TaskId, TaskStatus};

#[tokio::test]
async fn same_object_three_times_yields_one_row() {
    let scripts = tempfile::tempdir().unwrap();
    let line = r#"{"title":"same","url":"https://example.com/x"}"#;
    let script = lines_script(scripts.path(), &[line, line, line]);
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    let task = rig.wait_terminal("t-1").await;

    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.items_count, 1);
    assert_eq!(
        rig.store.count_results_for_task(&TaskId::new("t-1")).unwrap(),
        1
    );
}

#[tokio::test]
async fn key_order_does_not_defeat_dedup() {
    let scripts = tempfile::tempdir().unwrap();
    let script = lines_script(
        scripts.path(),
        &[r#"{"a":1,"b":2}"#, r#"{"b":2,"a":1}"#],
    );
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    let task = rig.wait_terminal("t-1").await;

    assert_eq!(task.items_count, 1);
}

#[tokio::test]
async fn duplicates_across_tasks_are_allowed() {
    let scripts = tempfile::tempdir().unwrap();
    let line = r#"{"title":"shared"}"#;
    let script = lines_script(scripts.path(), &[line]);
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    rig.submit("t-2");
    let first = rig.wait_terminal("t-1").await;
    let second = rig.wait_terminal("t-2").await;

    assert_eq!(first.items_count, 1);
    assert_eq!(second.items_count, 1);
    let fp_a = &rig.store.results_for_task(&TaskId::new("t-1")).unwrap()[0].fingerprint;
    let fp_b = &rig.store.results_for_task(&TaskId::new("t-2")).unwrap()[0].fingerprint;
    assert_eq!(fp_a, fp_b, "same content, same fingerprint, different tasks");
}
