// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! Each entry runs once, in order, inside a transaction; `schema_version`
//! records the last applied index. Timestamps are epoch milliseconds.
//! Note the deliberate absence of a uniqueness constraint on
//! `results(task_id, fingerprint)` — per-task dedup is the tailer's job.

use crate::error::{classify, StoreError};
use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    "
    CREATE TABLE projects (
        id              TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        path            TEXT NOT NULL UNIQUE,
        owner_id        TEXT NOT NULL,
        persist_results INTEGER NOT NULL DEFAULT 1,
        created_at_ms   INTEGER NOT NULL,
        updated_at_ms   INTEGER NOT NULL,
        UNIQUE (name, owner_id)
    );

    CREATE TABLE spiders (
        id         TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        name       TEXT NOT NULL,
        source     TEXT NOT NULL DEFAULT '',
        settings   TEXT,
        framework  TEXT,
        UNIQUE (name, project_id)
    );

    CREATE TABLE schedules (
        id          TEXT PRIMARY KEY,
        project_id  TEXT NOT NULL REFERENCES projects(id),
        spider_id   TEXT NOT NULL REFERENCES spiders(id) ON DELETE CASCADE,
        owner_id    TEXT NOT NULL,
        name        TEXT NOT NULL,
        cron_expr   TEXT NOT NULL,
        active      INTEGER NOT NULL DEFAULT 1,
        last_run_ms INTEGER,
        next_run_ms INTEGER
    );
    CREATE INDEX idx_schedules_active ON schedules(active, next_run_ms);

    CREATE TABLE tasks (
        id                TEXT PRIMARY KEY,
        project_id        TEXT NOT NULL,
        spider_id         TEXT NOT NULL,
        schedule_id       TEXT,
        owner_id          TEXT NOT NULL,
        status            TEXT NOT NULL,
        started_at_ms     INTEGER,
        finished_at_ms    INTEGER,
        items_count       INTEGER NOT NULL DEFAULT 0,
        requests_count    INTEGER NOT NULL DEFAULT 0,
        error_count       INTEGER NOT NULL DEFAULT 0,
        error_message     TEXT,
        settings_override TEXT,
        output_path       TEXT
    );
    CREATE INDEX idx_tasks_schedule ON tasks(schedule_id, status);
    CREATE INDEX idx_tasks_status ON tasks(status, started_at_ms);

    CREATE TABLE results (
        id               TEXT PRIMARY KEY,
        task_id          TEXT NOT NULL,
        payload          TEXT NOT NULL,
        url              TEXT,
        crawl_start_ms   INTEGER,
        item_acquired_ms INTEGER,
        fingerprint      TEXT NOT NULL
    );
    CREATE INDEX idx_results_task ON results(task_id);
    CREATE INDEX idx_results_fingerprint ON results(task_id, fingerprint);

    CREATE TABLE events (
        seq     INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        kind    TEXT NOT NULL,
        at_ms   INTEGER NOT NULL,
        attrs   TEXT NOT NULL DEFAULT '{}'
    );
    CREATE INDEX idx_events_task ON events(task_id, seq);
    ",
];

/// Apply any unapplied migrations.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    )
    .map_err(classify)?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(classify)?;

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i64;
        if version <= current {
            continue;
        }
        tracing::info!(version, "applying schema migration");
        conn.execute_batch(&format!(
            "BEGIN;\n{migration}\nINSERT INTO schema_version (version) VALUES ({version});\nCOMMIT;"
        ))
        .map_err(classify)?;
    }
    Ok(())
}
