// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule queries, including the firing reservation CAS.

use crate::{Store, StoreError};
use rusqlite::{params, Row};
use sui_core::{OwnerId, ProjectId, Schedule, ScheduleId, SpiderId};

fn row_to_schedule(row: &Row<'_>) -> Result<Schedule, rusqlite::Error> {
    Ok(Schedule {
        id: ScheduleId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        spider_id: SpiderId::new(row.get::<_, String>(2)?),
        owner: OwnerId::new(row.get::<_, String>(3)?),
        name: row.get(4)?,
        cron_expr: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        last_run_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        next_run_ms: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
    })
}

const SCHEDULE_COLS: &str =
    "id, project_id, spider_id, owner_id, name, cron_expr, active, last_run_ms, next_run_ms";

impl Store {
    pub fn insert_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.with_retry("insert_schedule", |conn| {
            conn.execute(
                "INSERT INTO schedules (id, project_id, spider_id, owner_id, name, cron_expr, active, last_run_ms, next_run_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    schedule.id.as_str(),
                    schedule.project_id.as_str(),
                    schedule.spider_id.as_str(),
                    schedule.owner.as_str(),
                    schedule.name,
                    schedule.cron_expr,
                    schedule.active as i64,
                    schedule.last_run_ms.map(|v| v as i64),
                    schedule.next_run_ms.map(|v| v as i64),
                ],
            )
            .map(|_| ())
        })
    }

    pub fn schedule(&self, id: &ScheduleId) -> Result<Schedule, StoreError> {
        self.with_retry("schedule", |conn| {
            conn.query_row(
                &format!("SELECT {SCHEDULE_COLS} FROM schedules WHERE id = ?1"),
                params![id.as_str()],
                row_to_schedule,
            )
        })
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(format!("schedule {id}")),
            other => other,
        })
    }

    /// All schedules with `active = 1`, for the scheduler's refresh.
    pub fn active_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        self.with_retry("active_schedules", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLS} FROM schedules WHERE active = 1 ORDER BY id"
            ))?;
            let rows = stmt.query_map([], row_to_schedule)?;
            rows.collect()
        })
    }

    /// Initialise `next_run` for a schedule that doesn't have one yet.
    /// Conditional on NULL so a concurrent scheduler can't move an already
    /// reserved firing backwards.
    pub fn init_next_run(&self, id: &ScheduleId, next_run_ms: u64) -> Result<bool, StoreError> {
        self.with_retry("init_next_run", |conn| {
            conn.execute(
                "UPDATE schedules SET next_run_ms = ?2 WHERE id = ?1 AND next_run_ms IS NULL",
                params![id.as_str(), next_run_ms as i64],
            )
            .map(|n| n > 0)
        })
    }

    /// Reserve a firing: atomically advance `last_run`/`next_run`, keyed on
    /// the `last_run` value this scheduler observed. A zero affected-row
    /// count means another instance won the race and the firing must be
    /// abandoned.
    pub fn reserve_firing(
        &self,
        id: &ScheduleId,
        observed_last_run_ms: Option<u64>,
        fired_at_ms: u64,
        next_run_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        self.with_retry("reserve_firing", |conn| {
            conn.execute(
                "UPDATE schedules
                 SET last_run_ms = ?3, next_run_ms = ?4
                 WHERE id = ?1 AND last_run_ms IS ?2 AND active = 1",
                params![
                    id.as_str(),
                    observed_last_run_ms.map(|v| v as i64),
                    fired_at_ms as i64,
                    next_run_ms.map(|v| v as i64),
                ],
            )
            .map(|n| n > 0)
        })
    }
}
