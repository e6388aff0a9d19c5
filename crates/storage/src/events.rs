// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log.

use crate::{Store, StoreError};
use rusqlite::params;
use std::str::FromStr;
use sui_core::{EventKind, Notice, TaskId};

impl Store {
    /// Append one notice. The log is observability data; it is never read
    /// back by the control flow.
    pub fn append_event(&self, notice: &Notice) -> Result<(), StoreError> {
        self.with_retry("append_event", |conn| {
            conn.execute(
                "INSERT INTO events (task_id, kind, at_ms, attrs) VALUES (?1, ?2, ?3, ?4)",
                params![
                    notice.task_id.as_str(),
                    notice.kind.to_string(),
                    notice.at_ms as i64,
                    notice.attrs.to_string(),
                ],
            )
            .map(|_| ())
        })
    }

    /// Most recent notices for a task, newest last.
    pub fn events_for_task(&self, task_id: &TaskId, limit: u64) -> Result<Vec<Notice>, StoreError> {
        self.with_retry("events_for_task", |conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, kind, at_ms, attrs FROM events
                 WHERE task_id = ?1
                 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![task_id.as_str(), limit as i64], |row| {
                let kind_text: String = row.get(1)?;
                let kind = parse_kind(&kind_text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?;
                let attrs_text: String = row.get(3)?;
                Ok(Notice {
                    task_id: TaskId::new(row.get::<_, String>(0)?),
                    kind,
                    at_ms: row.get::<_, i64>(2)? as u64,
                    attrs: serde_json::from_str(&attrs_text)
                        .unwrap_or(serde_json::Value::Null),
                })
            })?;
            let mut notices: Vec<Notice> = rows.collect::<Result<_, _>>()?;
            notices.reverse();
            Ok(notices)
        })
    }
}

fn parse_kind(s: &str) -> Result<EventKind, String> {
    EventKind::from_str(s)
}
