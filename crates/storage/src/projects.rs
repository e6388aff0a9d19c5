// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project queries.

use crate::{Store, StoreError};
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use sui_core::{OwnerId, Project, ProjectId};

fn row_to_project(row: &Row<'_>) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: ProjectId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        owner: OwnerId::new(row.get::<_, String>(3)?),
        persist_results: row.get::<_, i64>(4)? != 0,
        created_at_ms: row.get::<_, i64>(5)? as u64,
        updated_at_ms: row.get::<_, i64>(6)? as u64,
    })
}

const PROJECT_COLS: &str =
    "id, name, path, owner_id, persist_results, created_at_ms, updated_at_ms";

impl Store {
    pub fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        self.with_retry("insert_project", |conn| {
            conn.execute(
                "INSERT INTO projects (id, name, path, owner_id, persist_results, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.id.as_str(),
                    project.name,
                    project.path.to_string_lossy(),
                    project.owner.as_str(),
                    project.persist_results as i64,
                    project.created_at_ms as i64,
                    project.updated_at_ms as i64,
                ],
            )
            .map(|_| ())
        })
    }

    pub fn project(&self, id: &ProjectId) -> Result<Project, StoreError> {
        self.with_retry("project", |conn| {
            conn.query_row(
                &format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"),
                params![id.as_str()],
                row_to_project,
            )
        })
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(format!("project {id}")),
            other => other,
        })
    }

    /// Delete a project. Refused while it still has active schedules or
    /// non-terminal tasks.
    pub fn delete_project(&self, id: &ProjectId) -> Result<(), StoreError> {
        let blocked = self.with_retry("delete_project_guard", |conn| {
            let active_schedules = count_where(
                conn,
                "SELECT COUNT(*) FROM schedules WHERE project_id = ?1 AND active = 1",
                id.as_str(),
            )?;
            let live_tasks = count_where(
                conn,
                "SELECT COUNT(*) FROM tasks WHERE project_id = ?1 AND status IN ('pending', 'running')",
                id.as_str(),
            )?;
            Ok(active_schedules > 0 || live_tasks > 0)
        })?;
        if blocked {
            return Err(StoreError::Conflict(format!(
                "project {id} has active schedules or running tasks"
            )));
        }
        self.with_retry("delete_project", |conn| {
            conn.execute("DELETE FROM schedules WHERE project_id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM spiders WHERE project_id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM projects WHERE id = ?1", params![id.as_str()])
                .map(|_| ())
        })
    }
}

fn count_where(conn: &Connection, sql: &str, id: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(sql, params![id], |row| row.get(0))
}
