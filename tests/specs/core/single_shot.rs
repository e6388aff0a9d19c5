// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-shot success: an ad-hoc task whose scraper writes three lines
//! and exits 0 finishes with three linked result rows.

use crate::prelude::*;
use sui_core::{TaskId, TaskStatus};

#[tokio::test]
async fn single_shot_success() {
    let scripts = tempfile::tempdir().unwrap();
    let script = lines_script(
        scripts.path(),
        &[
            r#"{"rank":1,"title":"a","url":"https://example.com/a"}"#,
            r#"{"rank":2,"title":"b","url":"https://example.com/b"}"#,
            r#"{"rank":3,"title":"c","url":"https://example.com/c"}"#,
        ],
    );
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    let task = rig.wait_terminal("t-1").await;

    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.items_count, 3);
    assert_eq!(task.error_count, 0);
    assert!(task.error_message.is_none());

    let rows = rig.store.results_for_task(&TaskId::new("t-1")).unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.task_id, "t-1");
        assert_eq!(row.fingerprint.len(), 64);
        assert!(row.url.as_deref().unwrap().starts_with("https://example.com/"));
    }

    // The output file lives under the project directory.
    let output = task.output_path.unwrap();
    assert!(output.starts_with(rig.config.projects_root.join("p1")));
    assert!(output.exists());
}

#[tokio::test]
async fn reconciler_after_success_changes_nothing() {
    let scripts = tempfile::tempdir().unwrap();
    let script = lines_script(scripts.path(), &[r#"{"rank":1}"#]);
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    rig.wait_terminal("t-1").await;

    let report = rig.reconciler.run_once().await;
    assert!(report.is_clean(), "unexpected repairs: {report:?}");

    let again = rig.reconciler.run_once().await;
    assert!(again.is_clean());
}
