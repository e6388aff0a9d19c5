// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation mid-run: whatever reached disk before SIGTERM is kept.

use crate::prelude::*;
use std::time::{Duration, Instant};
use sui_adapters::fake::{script_scraper, Step};
use sui_core::{TaskId, TaskStatus};

#[tokio::test]
async fn cancel_keeps_flushed_items() {
    let scripts = tempfile::tempdir().unwrap();
    let script = script_scraper(
        scripts.path(),
        "sleeper",
        &[
            Step::WriteLine(r#"{"rank":1}"#.to_string()),
            Step::SleepMs(60_000),
            Step::WriteLine(r#"{"rank":2}"#.to_string()),
        ],
        0,
    );
    let rig = rig_with_script(&script);

    rig.submit("t-1");

    // Wait until the first line has been ingested, then cancel.
    let deadline = Instant::now() + SPEC_WAIT_MAX;
    loop {
        if rig
            .store
            .count_results_for_task(&TaskId::new("t-1"))
            .unwrap()
            >= 1
        {
            break;
        }
        assert!(Instant::now() < deadline, "first item never arrived");
        tokio::time::sleep(SPEC_POLL).await;
    }

    let cancelled_at = Instant::now();
    assert!(rig.dispatcher.cancel(&TaskId::new("t-1")));
    let task = rig.wait_terminal("t-1").await;
    let took = cancelled_at.elapsed();

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.items_count, 1);
    // SIGTERM lands well inside hard_kill_grace_period + 1s.
    assert!(
        took < rig.config.hard_kill_grace_period + Duration::from_secs(1),
        "termination took {took:?}"
    );
}

#[tokio::test]
async fn cancel_of_unknown_task_is_refused() {
    let scripts = tempfile::tempdir().unwrap();
    let script = lines_script(scripts.path(), &[r#"{"x":1}"#]);
    let rig = rig_with_script(&script);

    assert!(!rig.dispatcher.cancel(&TaskId::new("t-nope")));
}
