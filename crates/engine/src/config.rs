// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tunables and their defaults.

use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// All knobs the engine components read. Constructed once by the daemon
/// from file + environment and passed down explicitly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timezone cron expressions are evaluated in.
    pub timezone: Tz,
    /// Directory all project paths resolve against.
    pub projects_root: PathBuf,
    /// Scraper executable spawned per task.
    pub scraper_command: String,
    /// Arguments placed before the spider name (e.g. `["crawl"]`).
    pub scraper_args: Vec<String>,
    /// Connection string handed to scrapers via `DATABASE_URL` when the
    /// project persists results.
    pub database_url: Option<String>,

    // Dispatcher
    pub max_concurrent_tasks: usize,
    pub per_project_limit: Option<usize>,
    pub queue_capacity: usize,
    pub spawn_timeout: Duration,
    pub task_timeout: Duration,
    pub hard_kill_grace_period: Duration,

    // Scheduler
    pub sync_interval: Duration,
    pub tick_interval: Duration,
    pub conflict_window: Duration,

    // Tailer
    pub file_appear_timeout: Duration,
    pub poll_interval: Duration,
    pub batch_max: usize,
    pub batch_interval: Duration,
    pub max_pending_bytes: usize,
    /// In-memory dedup cap; beyond it the tailer falls back to store-side
    /// fingerprint checks.
    pub max_dedup_entries: usize,

    // Reconciler
    pub reconcile_interval: Duration,
    pub reconcile_window: Duration,
    pub stuck_timeout: Duration,

    // Retention
    pub retention_interval: Duration,
    pub max_jsonl_lines: usize,
    pub keep_sessions: usize,
    pub max_backup_age: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Tokyo,
            projects_root: PathBuf::from("scrapy_projects"),
            scraper_command: "scrapy".to_string(),
            scraper_args: vec!["crawl".to_string()],
            database_url: None,

            max_concurrent_tasks: 4,
            per_project_limit: None,
            queue_capacity: 64,
            spawn_timeout: Duration::from_secs(30),
            task_timeout: Duration::from_secs(3600),
            hard_kill_grace_period: Duration::from_secs(10),

            sync_interval: Duration::from_secs(10),
            tick_interval: Duration::from_secs(1),
            conflict_window: Duration::from_secs(300),

            file_appear_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            batch_max: 200,
            batch_interval: Duration::from_secs(1),
            max_pending_bytes: 16 * 1024 * 1024,
            max_dedup_entries: 100_000,

            reconcile_interval: Duration::from_secs(120),
            reconcile_window: Duration::from_secs(6 * 3600),
            stuck_timeout: Duration::from_secs(30 * 60),

            retention_interval: Duration::from_secs(3600),
            max_jsonl_lines: 500,
            keep_sessions: 1,
            max_backup_age: Duration::from_secs(30 * 24 * 3600),
        }
    }
}
