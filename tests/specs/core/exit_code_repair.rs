// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit-code repair: a scraper that writes results but exits non-zero is
//! first recorded as Failed, then repaired to Finished by the reconciler.

use crate::prelude::*;
use sui_adapters::fake::{script_scraper, Step};
use sui_core::TaskStatus;

#[tokio::test]
async fn failed_with_results_becomes_finished() {
    let scripts = tempfile::tempdir().unwrap();
    let script = script_scraper(
        scripts.path(),
        "flaky",
        &[
            Step::WriteLine(r#"{"rank":1}"#.to_string()),
            Step::WriteLine(r#"{"rank":2}"#.to_string()),
        ],
        1,
    );
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    let task = rig.wait_terminal("t-1").await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("exit code 1"));
    assert_eq!(task.items_count, 2);

    let report = rig.reconciler.run_once().await;
    assert_eq!(report.repaired_finished, 1);

    let repaired = rig.wait_terminal("t-1").await;
    assert_eq!(repaired.status, TaskStatus::Finished);
    assert_eq!(repaired.items_count, 2);
    assert!(repaired.error_message.is_none());
}

#[tokio::test]
async fn failed_without_results_stays_failed() {
    let scripts = tempfile::tempdir().unwrap();
    let script = script_scraper(scripts.path(), "broken", &[], 1);
    let rig = rig_with_script(&script);

    rig.submit("t-1");
    let task = rig.wait_terminal("t-1").await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.items_count, 0);

    let report = rig.reconciler.run_once().await;
    assert_eq!(report.repaired_finished, 0);
    assert_eq!(
        rig.wait_terminal("t-1").await.status,
        TaskStatus::Failed,
        "zero-result failures are never force-finished"
    );
}
