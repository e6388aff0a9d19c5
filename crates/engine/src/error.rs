// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Parse errors during ingestion never appear here: the tailer logs,
//! counts, and swallows them. Everything below either terminates one task
//! or, at startup, the process.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] sui_storage::StoreError),
    #[error(transparent)]
    Spawn(#[from] sui_adapters::SpawnError),
    #[error("invalid cron expression: {0}")]
    Cron(#[from] sui_core::CronError),
    #[error("task timed out after {0:?}")]
    TaskTimeout(Duration),
    #[error("queue full, request rejected")]
    Backpressure,
}
