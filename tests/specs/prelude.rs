// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for core specs: a temp store, a dispatcher wired to a
//! scripted scraper, and polling helpers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sui_core::{test_support, Notice, SystemClock, Task, TaskId};
use sui_engine::{Dispatcher, EngineConfig, NoticeTx, Reconciler};
use sui_storage::Store;
use tokio::sync::mpsc;

pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);
pub const SPEC_POLL: Duration = Duration::from_millis(50);

/// Path to the `suid` binary, built from the sibling `sui-daemon` package.
///
/// `CARGO_BIN_EXE_suid` is only set for integration tests owned by the
/// package that declares the `[[bin]]` target; these specs live in the
/// workspace root package, so the binary is located relative to the test
/// executable's own directory instead.
pub fn suid_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push(format!("suid{}", std::env::consts::EXE_SUFFIX));
    path
}

/// One assembled core slice: store + dispatcher + reconciler over a
/// scripted scraper command.
pub struct Rig {
    pub store: Store,
    pub dispatcher: Arc<Dispatcher<SystemClock>>,
    pub reconciler: Reconciler<SystemClock>,
    pub config: Arc<EngineConfig>,
    pub notice_tx: NoticeTx,
    pub notice_rx: mpsc::Receiver<Notice>,
    pub dir: tempfile::TempDir,
}

/// Build a rig whose dispatcher runs `script` for every task.
pub fn rig_with_script(script: &Path) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("specs.db")).unwrap();
    store
        .insert_project(&test_support::project("p-1", "p1"))
        .unwrap();
    store
        .insert_spider(&test_support::spider("s-1", "p-1", "s1"))
        .unwrap();

    let config = Arc::new(EngineConfig {
        projects_root: dir.path().to_path_buf(),
        scraper_command: script.to_string_lossy().into_owned(),
        scraper_args: vec![],
        max_concurrent_tasks: 2,
        queue_capacity: 8,
        file_appear_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(50),
        batch_interval: Duration::from_millis(50),
        hard_kill_grace_period: Duration::from_secs(2),
        ..EngineConfig::default()
    });

    let (notice_tx, notice_rx) = mpsc::channel(1024);
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        SystemClock,
        Arc::clone(&config),
        notice_tx.clone(),
    ));
    dispatcher.start();

    let reconciler = Reconciler::new(
        store.clone(),
        SystemClock,
        Arc::clone(&config),
        dispatcher.active(),
        notice_tx.clone(),
    );

    Rig {
        store,
        dispatcher,
        reconciler,
        config,
        notice_tx,
        notice_rx,
        dir,
    }
}

impl Rig {
    /// Poll until the task reaches a terminal state.
    pub async fn wait_terminal(&self, id: &str) -> Task {
        let task_id = TaskId::new(id);
        let deadline = Instant::now() + SPEC_WAIT_MAX;
        loop {
            let task = self.store.task(&task_id).unwrap();
            if task.is_terminal() {
                return task;
            }
            assert!(
                Instant::now() < deadline,
                "task {id} never reached a terminal state (status: {})",
                task.status
            );
            tokio::time::sleep(SPEC_POLL).await;
        }
    }

    pub fn submit(&self, task_id: &str) {
        self.dispatcher
            .accept(test_support::task_request(task_id, "p-1", "s-1"))
            .unwrap();
    }
}

/// A scraper script writing the given JSONL lines then exiting 0.
pub fn lines_script(dir: &Path, lines: &[&str]) -> PathBuf {
    sui_adapters::fake::lines_scraper(dir, "scraper", lines)
}
