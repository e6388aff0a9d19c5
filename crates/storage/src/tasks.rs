// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task queries: inserts, guarded status transitions, reconciliation scans.

use crate::{Store, StoreError};
use rusqlite::{params, Row};
use std::path::PathBuf;
use std::str::FromStr;
use sui_core::{OwnerId, ProjectId, ScheduleId, SpiderId, Task, TaskId, TaskStatus};

fn row_to_task(row: &Row<'_>) -> Result<Task, rusqlite::Error> {
    let status_text: String = row.get(5)?;
    let status = TaskStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    let settings: Option<String> = row.get(12)?;
    let output_path: Option<String> = row.get(13)?;
    Ok(Task {
        id: TaskId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        spider_id: SpiderId::new(row.get::<_, String>(2)?),
        schedule_id: row.get::<_, Option<String>>(3)?.map(ScheduleId::new),
        owner: OwnerId::new(row.get::<_, String>(4)?),
        status,
        started_at_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        finished_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        items_count: row.get::<_, i64>(8)? as u64,
        requests_count: row.get::<_, i64>(9)? as u64,
        error_count: row.get::<_, i64>(10)? as u64,
        error_message: row.get(11)?,
        settings_override: settings.and_then(|s| serde_json::from_str(&s).ok()),
        output_path: output_path.map(PathBuf::from),
    })
}

const TASK_COLS: &str = "id, project_id, spider_id, schedule_id, owner_id, status, \
     started_at_ms, finished_at_ms, items_count, requests_count, error_count, \
     error_message, settings_override, output_path";

/// SQL literal for the allowed source states of a terminal transition.
fn allowed_sources(to: TaskStatus) -> &'static str {
    match to {
        TaskStatus::Running => "('pending')",
        TaskStatus::Cancelled => "('pending', 'running')",
        TaskStatus::Failed => "('pending', 'running')",
        // Finished is reachable from running, and from failed via the
        // reconciler's repair path.
        TaskStatus::Finished => "('running', 'failed')",
        TaskStatus::Pending => "()",
    }
}

impl Store {
    pub fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let settings = task.settings_override.as_ref().map(|s| s.to_string());
        self.with_retry("insert_task", |conn| {
            conn.execute(
                "INSERT INTO tasks (id, project_id, spider_id, schedule_id, owner_id, status,
                                    started_at_ms, finished_at_ms, items_count, requests_count,
                                    error_count, error_message, settings_override, output_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    task.id.as_str(),
                    task.project_id.as_str(),
                    task.spider_id.as_str(),
                    task.schedule_id.as_ref().map(|s| s.as_str()),
                    task.owner.as_str(),
                    task.status.to_string(),
                    task.started_at_ms.map(|v| v as i64),
                    task.finished_at_ms.map(|v| v as i64),
                    task.items_count as i64,
                    task.requests_count as i64,
                    task.error_count as i64,
                    task.error_message,
                    settings,
                    task.output_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                ],
            )
            .map(|_| ())
        })
    }

    pub fn task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.with_retry("task", |conn| {
            conn.query_row(
                &format!("SELECT {TASK_COLS} FROM tasks WHERE id = ?1"),
                params![id.as_str()],
                row_to_task,
            )
        })
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(format!("task {id}")),
            other => other,
        })
    }

    /// Pending → Running, stamping `started_at`.
    pub fn mark_task_running(&self, id: &TaskId, started_at_ms: u64) -> Result<bool, StoreError> {
        self.with_retry("mark_task_running", |conn| {
            conn.execute(
                "UPDATE tasks SET status = 'running', started_at_ms = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id.as_str(), started_at_ms as i64],
            )
            .map(|n| n > 0)
        })
    }

    /// Move a task to a terminal state, guarded by the lifecycle's allowed
    /// source states. Returns false when the row was already elsewhere
    /// (e.g. a cancel raced the natural exit).
    pub fn finish_task(
        &self,
        id: &TaskId,
        to: TaskStatus,
        finished_at_ms: u64,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError> {
        if !to.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "finish_task called with non-terminal status {to}"
            )));
        }
        let sources = allowed_sources(to);
        self.with_retry("finish_task", move |conn| {
            conn.execute(
                &format!(
                    "UPDATE tasks SET status = ?2, finished_at_ms = ?3,
                            error_message = COALESCE(?4, error_message)
                     WHERE id = ?1 AND status IN {sources}"
                ),
                params![
                    id.as_str(),
                    to.to_string(),
                    finished_at_ms as i64,
                    error_message,
                ],
            )
            .map(|n| n > 0)
        })
    }

    /// Reconciler repair: Failed → Finished. Guarded in SQL so a
    /// concurrent status change invalidates the repair.
    pub fn repair_task_finished(&self, id: &TaskId) -> Result<bool, StoreError> {
        self.with_retry("repair_task_finished", |conn| {
            conn.execute(
                "UPDATE tasks SET status = 'finished', error_message = NULL
                 WHERE id = ?1 AND status = 'failed'",
                params![id.as_str()],
            )
            .map(|n| n > 0)
        })
    }

    pub fn set_task_output_path(&self, id: &TaskId, path: &std::path::Path) -> Result<(), StoreError> {
        self.with_retry("set_task_output_path", |conn| {
            conn.execute(
                "UPDATE tasks SET output_path = ?2 WHERE id = ?1",
                params![id.as_str(), path.to_string_lossy().into_owned()],
            )
            .map(|_| ())
        })
    }

    /// Progress update from the tailer; it owns `items_count` while the
    /// task runs.
    pub fn set_task_items_count(&self, id: &TaskId, items: u64) -> Result<(), StoreError> {
        self.with_retry("set_task_items_count", |conn| {
            conn.execute(
                "UPDATE tasks SET items_count = ?2 WHERE id = ?1",
                params![id.as_str(), items as i64],
            )
            .map(|_| ())
        })
    }

    /// Final counter triplet written by the runner at termination.
    pub fn set_task_counts(
        &self,
        id: &TaskId,
        items: u64,
        requests: u64,
        errors: u64,
    ) -> Result<(), StoreError> {
        self.with_retry("set_task_counts", |conn| {
            conn.execute(
                "UPDATE tasks SET items_count = ?2, requests_count = ?3, error_count = ?4
                 WHERE id = ?1",
                params![id.as_str(), items as i64, requests as i64, errors as i64],
            )
            .map(|_| ())
        })
    }

    /// Conflict gate for the scheduler: is there a pending task for this
    /// schedule, or a running one started inside the conflict window?
    pub fn has_recent_active_for_schedule(
        &self,
        schedule_id: &ScheduleId,
        window_start_ms: u64,
    ) -> Result<bool, StoreError> {
        self.with_retry("has_recent_active_for_schedule", |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE schedule_id = ?1
                   AND (status = 'pending'
                        OR (status = 'running' AND started_at_ms >= ?2))",
                params![schedule_id.as_str(), window_start_ms as i64],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// All tasks produced by a schedule, newest insertion last.
    pub fn tasks_for_schedule(&self, schedule_id: &ScheduleId) -> Result<Vec<Task>, StoreError> {
        self.with_retry("tasks_for_schedule", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLS} FROM tasks WHERE schedule_id = ?1 ORDER BY rowid"
            ))?;
            let rows = stmt.query_map(params![schedule_id.as_str()], row_to_task)?;
            rows.collect()
        })
    }

    /// Running tasks whose `started_at` is older than `cutoff_ms`, for
    /// stuck detection.
    pub fn running_tasks_started_before(&self, cutoff_ms: u64) -> Result<Vec<Task>, StoreError> {
        self.with_retry("running_tasks_started_before", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLS} FROM tasks
                 WHERE status = 'running' AND started_at_ms < ?1"
            ))?;
            let rows = stmt.query_map(params![cutoff_ms as i64], row_to_task)?;
            rows.collect()
        })
    }

    /// Terminal tasks that entered the reconciliation window.
    pub fn terminal_tasks_since(&self, since_ms: u64) -> Result<Vec<Task>, StoreError> {
        self.with_retry("terminal_tasks_since", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLS} FROM tasks
                 WHERE status IN ('finished', 'failed', 'cancelled')
                   AND COALESCE(finished_at_ms, started_at_ms, 0) >= ?1"
            ))?;
            let rows = stmt.query_map(params![since_ms as i64], row_to_task)?;
            rows.collect()
        })
    }
}
