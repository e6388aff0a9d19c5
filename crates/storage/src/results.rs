// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result queries: bulk inserts from the tailer, counts, dedup support.

use crate::{Store, StoreError};
use rusqlite::{params, Row};
use sui_core::{Payload, ResultId, ResultRecord, TaskId};

fn row_to_result(row: &Row<'_>) -> Result<ResultRecord, rusqlite::Error> {
    let payload_text: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ResultRecord {
        id: ResultId::new(row.get::<_, String>(0)?),
        task_id: TaskId::new(row.get::<_, String>(1)?),
        payload: Payload::new(payload),
        url: row.get(3)?,
        crawl_start_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        item_acquired_ms: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        fingerprint: row.get(6)?,
    })
}

const RESULT_COLS: &str =
    "id, task_id, payload, url, crawl_start_ms, item_acquired_ms, fingerprint";

impl Store {
    /// Insert a batch of results in one transaction. The tailer calls this
    /// on every flush; a batch either lands whole or not at all.
    pub fn insert_results(&self, batch: &[ResultRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_tx("insert_results", |tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO results (id, task_id, payload, url, crawl_start_ms, item_acquired_ms, fingerprint)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in batch {
                stmt.execute(params![
                    record.id.as_str(),
                    record.task_id.as_str(),
                    record.payload.as_value().to_string(),
                    record.url,
                    record.crawl_start_ms.map(|v| v as i64),
                    record.item_acquired_ms.map(|v| v as i64),
                    record.fingerprint,
                ])?;
            }
            Ok(())
        })
    }

    pub fn results_for_task(&self, task_id: &TaskId) -> Result<Vec<ResultRecord>, StoreError> {
        self.with_retry("results_for_task", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESULT_COLS} FROM results WHERE task_id = ?1 ORDER BY rowid"
            ))?;
            let rows = stmt.query_map(params![task_id.as_str()], row_to_result)?;
            rows.collect()
        })
    }

    pub fn count_results_for_task(&self, task_id: &TaskId) -> Result<u64, StoreError> {
        self.with_retry("count_results_for_task", |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM results WHERE task_id = ?1",
                params![task_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// All fingerprints already stored for a task, used to warm the
    /// tailer's dedup set after a restart.
    pub fn fingerprints_for_task(&self, task_id: &TaskId) -> Result<Vec<String>, StoreError> {
        self.with_retry("fingerprints_for_task", |conn| {
            let mut stmt =
                conn.prepare("SELECT fingerprint FROM results WHERE task_id = ?1")?;
            let rows = stmt.query_map(params![task_id.as_str()], |row| row.get(0))?;
            rows.collect()
        })
    }

    /// Store-side dedup check, used once the in-memory set hits its cap.
    pub fn fingerprint_exists(&self, task_id: &TaskId, fingerprint: &str) -> Result<bool, StoreError> {
        self.with_retry("fingerprint_exists", |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM results WHERE task_id = ?1 AND fingerprint = ?2",
                params![task_id.as_str(), fingerprint],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Remove duplicate `(task, fingerprint)` rows, keeping the oldest of
    /// each group. Returns the number of rows deleted.
    pub fn prune_duplicate_results(&self, task_id: &TaskId) -> Result<u64, StoreError> {
        self.with_retry("prune_duplicate_results", |conn| {
            conn.execute(
                "DELETE FROM results
                 WHERE task_id = ?1
                   AND rowid NOT IN (
                       SELECT MIN(rowid) FROM results WHERE task_id = ?1 GROUP BY fingerprint
                   )",
                params![task_id.as_str()],
            )
            .map(|n| n as u64)
        })
    }
}
