// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{drain_notices, notice_channel, seeded_store, test_config};
use std::time::Instant;
use sui_adapters::fake::{self, Step};
use sui_core::test_support::task_request;
use sui_core::{EventKind, SystemClock, TaskStatus};

/// Dispatcher wired to a scripted scraper. The script path becomes the
/// scraper command; the spider name it receives as argv[1] is ignored.
fn dispatcher_with_script(
    store: &Store,
    dir: &std::path::Path,
    script: &std::path::Path,
) -> (Arc<Dispatcher<SystemClock>>, tokio::sync::mpsc::Receiver<sui_core::Notice>) {
    let (notice_tx, notice_rx) = notice_channel();
    let mut config = test_config(dir);
    config.scraper_command = script.to_string_lossy().into_owned();
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        SystemClock,
        Arc::new(config),
        notice_tx,
    ));
    dispatcher.start();
    (dispatcher, notice_rx)
}

async fn wait_terminal(store: &Store, id: &TaskId) -> Task {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let task = store.task(id).unwrap();
        if task.is_terminal() {
            return task;
        }
        assert!(Instant::now() < deadline, "task never reached a terminal state");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn backpressure_rejects_before_creating_a_row() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let (notice_tx, _rx) = notice_channel();
    let mut config = test_config(dir.path());
    config.queue_capacity = 2;
    // Not started: requests stay queued.
    let dispatcher = Dispatcher::new(store.clone(), SystemClock, Arc::new(config), notice_tx);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    dispatcher.accept(task_request("t-2", "p-1", "s-1")).unwrap();
    let err = dispatcher
        .accept(task_request("t-3", "p-1", "s-1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Backpressure));

    assert!(store.task(&TaskId::new("t-1")).is_ok());
    assert!(store.task(&TaskId::new("t-2")).is_ok());
    // The rejected request never produced a row.
    assert!(store.task(&TaskId::new("t-3")).is_err());
}

#[tokio::test]
async fn single_shot_success_ingests_all_lines() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::lines_scraper(
        dir.path(),
        "ok",
        &[
            r#"{"rank":1,"title":"a"}"#,
            r#"{"rank":2,"title":"b"}"#,
            r#"{"rank":3,"title":"c"}"#,
        ],
    );
    let (dispatcher, mut rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.items_count, 3);
    assert_eq!(task.error_count, 0);
    assert!(task.started_at_ms.is_some());
    assert!(task.finished_at_ms.is_some());
    assert_eq!(store.count_results_for_task(&TaskId::new("t-1")).unwrap(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let kinds: Vec<EventKind> = drain_notices(&mut rx).iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&EventKind::TaskStarted));
    assert!(kinds.contains(&EventKind::TaskFinished));
}

#[tokio::test]
async fn nonzero_exit_without_results_is_failed() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::script_scraper(dir.path(), "bad", &[], 1);
    let (dispatcher, mut rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("exit code 1"));
    assert_eq!(task.items_count, 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let notices = drain_notices(&mut rx);
    assert!(notices.iter().any(|n| n.kind == EventKind::TaskFailed));
}

#[tokio::test]
async fn nonzero_exit_with_results_is_failed_until_reconciled() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::script_scraper(
        dir.path(),
        "partial",
        &[
            Step::WriteLine(r#"{"rank":1}"#.to_string()),
            Step::WriteLine(r#"{"rank":2}"#.to_string()),
        ],
        1,
    );
    let (dispatcher, _rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    // The dispatcher trusts the exit code; repair is the reconciler's job.
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.items_count, 2);
}

#[tokio::test]
async fn duplicate_lines_are_suppressed() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let line = r#"{"title":"same","url":"https://example.com"}"#;
    let script = fake::lines_scraper(dir.path(), "dup", &[line, line, line]);
    let (dispatcher, _rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.items_count, 1);
    assert_eq!(store.count_results_for_task(&TaskId::new("t-1")).unwrap(), 1);
}

#[tokio::test]
async fn cancellation_keeps_what_reached_disk() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::script_scraper(
        dir.path(),
        "slow",
        &[
            Step::WriteLine(r#"{"rank":1}"#.to_string()),
            Step::SleepMs(60_000),
            Step::WriteLine(r#"{"rank":2}"#.to_string()),
        ],
        0,
    );
    let (dispatcher, _rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();

    // Give the scraper time to write the first line.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let cancelled_at = Instant::now();
    assert!(dispatcher.cancel(&TaskId::new("t-1")));

    let task = wait_terminal(&store, &TaskId::new("t-1")).await;
    let took = cancelled_at.elapsed();

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.items_count, 1);
    // SIGTERM kills the sleeping shell well inside grace + 1s.
    assert!(took < Duration::from_secs(3), "kill took {took:?}");
}

#[tokio::test]
async fn stdout_without_output_file_is_failed() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::script_scraper(
        dir.path(),
        "chatty",
        &[Step::WriteStdout("progress line".to_string())],
        0,
    );
    let (dispatcher, _rx) = dispatcher_with_script(&store, dir.path(), &script);

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("no output file produced"));
}

#[tokio::test]
async fn spawn_failure_persists_a_failed_task() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, _rx) = dispatcher_with_script(
        &store,
        dir.path(),
        std::path::Path::new("/no/such/scraper-binary"),
    );

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    let task = wait_terminal(&store, &TaskId::new("t-1")).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.as_deref().unwrap().starts_with("spawn:"));
}

#[tokio::test]
async fn task_cancelled_while_queued_is_skipped() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let (notice_tx, _rx) = notice_channel();
    let mut config = test_config(dir.path());
    let script = fake::lines_scraper(dir.path(), "late", &[r#"{"rank":1}"#]);
    config.scraper_command = script.to_string_lossy().into_owned();
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        SystemClock,
        Arc::new(config),
        notice_tx,
    ));

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    // External API cancels the task before any worker picks it up.
    store
        .finish_task(&TaskId::new("t-1"), TaskStatus::Cancelled, 1, Some("cancelled"))
        .unwrap();

    dispatcher.start();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let task = store.task(&TaskId::new("t-1")).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(store.count_results_for_task(&TaskId::new("t-1")).unwrap(), 0);
}

#[tokio::test]
async fn per_project_limit_serialises_runs() {
    let store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let script = fake::script_scraper(
        dir.path(),
        "brief",
        &[
            Step::WriteLine(r#"{"x":1}"#.to_string()),
            Step::SleepMs(300),
        ],
        0,
    );
    let (notice_tx, _rx) = notice_channel();
    let mut config = test_config(dir.path());
    config.scraper_command = script.to_string_lossy().into_owned();
    config.per_project_limit = Some(1);
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        SystemClock,
        Arc::new(config),
        notice_tx,
    ));
    dispatcher.start();

    dispatcher.accept(task_request("t-1", "p-1", "s-1")).unwrap();
    dispatcher.accept(task_request("t-2", "p-1", "s-1")).unwrap();

    let first = wait_terminal(&store, &TaskId::new("t-1")).await;
    let second = wait_terminal(&store, &TaskId::new("t-2")).await;
    assert_eq!(first.status, TaskStatus::Finished);
    assert_eq!(second.status, TaskStatus::Finished);

    // With a per-project limit of 1 the runs cannot overlap: whichever
    // started later must have started at or after the other finished.
    let (earlier, later) = if first.started_at_ms <= second.started_at_ms {
        (&first, &second)
    } else {
        (&second, &first)
    };
    assert!(
        later.started_at_ms.unwrap() >= earlier.finished_at_ms.unwrap(),
        "project-limited tasks overlapped"
    );
}
