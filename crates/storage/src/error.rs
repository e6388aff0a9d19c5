// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.
//!
//! Transient errors (busy/locked/interrupted) are retried by the caller
//! inside the store; permanent errors (constraint violations, schema
//! mismatch) surface immediately and are never retried.

use thiserror::Error;

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection contention or interruption; safe to retry.
    #[error("transient store error: {0}")]
    Transient(String),
    /// Constraint violation, schema mismatch, I/O corruption; not retried.
    #[error("permanent store error: {0}")]
    Permanent(String),
    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A guarded mutation was refused (delete guard, illegal transition).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Map a rusqlite error onto the taxonomy.
pub(crate) fn classify(e: rusqlite::Error) -> StoreError {
    use rusqlite::ffi::ErrorCode;
    match &e {
        rusqlite::Error::SqliteFailure(ffi, _) => match ffi.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted => {
                StoreError::Transient(e.to_string())
            }
            ErrorCode::ConstraintViolation => StoreError::Permanent(e.to_string()),
            _ => StoreError::Permanent(e.to_string()),
        },
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(e.to_string()),
        _ => StoreError::Permanent(e.to_string()),
    }
}
