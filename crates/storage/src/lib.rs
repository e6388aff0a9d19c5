// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sui-storage: SQLite-backed relational store for the execution core.
//!
//! One database holds `projects`, `spiders`, `schedules`, `tasks`,
//! `results`, and an append-only `events` log. All mutations that
//! coordinate concurrent actors are row-level conditional updates: the
//! scheduler's firing reservation CASes on `last_run`, and task status
//! transitions are guarded by the allowed source states in SQL.

mod error;
mod events;
mod projects;
mod results;
mod schedules;
mod schema;
mod spiders;
mod tasks;

pub use error::StoreError;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default per-operation busy timeout.
pub const DEFAULT_DB_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget for transient failures.
pub const DEFAULT_DB_MAX_RETRIES: u32 = 5;

/// Base delay for the exponential retry backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Handle to the relational store.
///
/// Cloning is cheap; all clones share one serialized connection. SQLite
/// operations here are short row-level statements, so a single guarded
/// connection keeps the concurrency story simple while WAL mode keeps
/// readers unblocked.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    max_retries: u32,
}

impl Store {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Permanent(format!("create db dir: {e}")))?;
        }
        let conn = Connection::open(path).map_err(error::classify)?;
        Self::init(conn, DEFAULT_DB_TIMEOUT, DEFAULT_DB_MAX_RETRIES)
    }

    /// Open with explicit timeout/retry settings.
    pub fn open_with(
        path: &Path,
        db_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Permanent(format!("create db dir: {e}")))?;
        }
        let conn = Connection::open(path).map_err(error::classify)?;
        Self::init(conn, db_timeout, max_retries)
    }

    /// In-memory store for tests.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(error::classify)?;
        Self::init(conn, DEFAULT_DB_TIMEOUT, DEFAULT_DB_MAX_RETRIES)
    }

    fn init(conn: Connection, db_timeout: Duration, max_retries: u32) -> Result<Self, StoreError> {
        conn.busy_timeout(db_timeout).map_err(error::classify)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(error::classify)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(error::classify)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(error::classify)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_retries,
        })
    }

    /// Run `op` against the connection, retrying transient failures with
    /// exponential backoff up to the configured budget. Permanent errors
    /// are returned on first sight.
    pub(crate) fn with_retry<T>(
        &self,
        op_name: &'static str,
        mut op: impl FnMut(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let conn = self.conn.lock();
                op(&conn)
            };
            match result {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let classified = error::classify(e);
                    match classified {
                        StoreError::Transient(_) if attempt < self.max_retries => {
                            attempt += 1;
                            let backoff = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                            let jitter = Duration::from_millis(rand::random_range(0..25));
                            tracing::warn!(
                                op = op_name,
                                attempt,
                                backoff_ms = backoff.as_millis() as u64,
                                "transient store error, retrying"
                            );
                            std::thread::sleep(backoff + jitter);
                        }
                        other => {
                            tracing::debug!(op = op_name, error = %other, "store operation failed");
                            return Err(other);
                        }
                    }
                }
            }
        }
    }

    /// Run `op` inside a single transaction with the same retry policy.
    pub(crate) fn with_tx<T>(
        &self,
        op_name: &'static str,
        mut op: impl FnMut(&rusqlite::Transaction<'_>) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let mut conn = self.conn.lock();
                conn.transaction().and_then(|tx| {
                    let v = op(&tx)?;
                    tx.commit()?;
                    Ok(v)
                })
            };
            match result {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let classified = error::classify(e);
                    match classified {
                        StoreError::Transient(_) if attempt < self.max_retries => {
                            attempt += 1;
                            let backoff = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                            tracing::warn!(op = op_name, attempt, "transient store error, retrying");
                            std::thread::sleep(backoff);
                        }
                        other => return Err(other),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests/mod.rs"]
mod tests;
