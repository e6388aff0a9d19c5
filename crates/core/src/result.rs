// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result entity: one scraped record linked to its task.

use crate::id::{ResultId, TaskId};
use crate::payload::Payload;
use serde::{Deserialize, Serialize};

/// A persisted scraped record.
///
/// `(task, fingerprint)` uniqueness is enforced by the tailer's in-memory
/// dedup set, deliberately not by the storage layer; duplicates across
/// tasks are expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: ResultId,
    pub task_id: TaskId,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_acquired_ms: Option<u64>,
    /// 64-hex SHA-256 over the payload's canonical bytes.
    pub fingerprint: String,
}
