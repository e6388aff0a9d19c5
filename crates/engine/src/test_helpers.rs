// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::config::EngineConfig;
use crate::NoticeTx;
use std::path::Path;
use std::time::Duration;
use sui_core::Notice;
use sui_storage::Store;
use tokio::sync::mpsc;

/// Store with one project (`p-1`, path `p1`) and one spider (`s-1`).
pub fn seeded_store() -> Store {
    let store = Store::open_memory().unwrap();
    store
        .insert_project(&sui_core::test_support::project("p-1", "p1"))
        .unwrap();
    store
        .insert_spider(&sui_core::test_support::spider("s-1", "p-1", "s1"))
        .unwrap();
    store
}

/// Engine config with test-friendly short intervals, rooted at `dir`.
pub fn test_config(dir: &Path) -> EngineConfig {
    EngineConfig {
        projects_root: dir.to_path_buf(),
        scraper_command: "/bin/sh".to_string(),
        scraper_args: vec![],
        max_concurrent_tasks: 2,
        queue_capacity: 4,
        spawn_timeout: Duration::from_secs(5),
        task_timeout: Duration::from_secs(30),
        hard_kill_grace_period: Duration::from_secs(2),
        conflict_window: Duration::from_secs(300),
        file_appear_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(50),
        batch_max: 50,
        batch_interval: Duration::from_millis(50),
        ..EngineConfig::default()
    }
}

/// Notice channel whose receiver is kept alive and drained on demand.
pub fn notice_channel() -> (NoticeTx, mpsc::Receiver<Notice>) {
    mpsc::channel(256)
}

/// Drain whatever notices are immediately available.
pub fn drain_notices(rx: &mut mpsc::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
