// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress notices published on the bus and mirrored to subscribers.
//!
//! A notice is not a first-class persisted entity; the store keeps an
//! append-only log of them for observability, and the gateway forwards the
//! wire envelope `{v:1, kind, task_id, instant, attrs}` to WebSocket
//! clients.

use crate::clock::format_iso_ms;
use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wire format version for the external backplane envelope.
pub const ENVELOPE_VERSION: u32 = 1;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStarted,
    TaskProgress,
    TaskFinished,
    TaskFailed,
    ResultIngested,
    ScheduleFired,
    TaskRepaired,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::TaskStarted => "task_started",
            EventKind::TaskProgress => "task_progress",
            EventKind::TaskFinished => "task_finished",
            EventKind::TaskFailed => "task_failed",
            EventKind::ResultIngested => "result_ingested",
            EventKind::ScheduleFired => "schedule_fired",
            EventKind::TaskRepaired => "task_repaired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_started" => Ok(EventKind::TaskStarted),
            "task_progress" => Ok(EventKind::TaskProgress),
            "task_finished" => Ok(EventKind::TaskFinished),
            "task_failed" => Ok(EventKind::TaskFailed),
            "result_ingested" => Ok(EventKind::ResultIngested),
            "schedule_fired" => Ok(EventKind::ScheduleFired),
            "task_repaired" => Ok(EventKind::TaskRepaired),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// One progress notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub task_id: TaskId,
    pub kind: EventKind,
    pub at_ms: u64,
    #[serde(default)]
    pub attrs: Value,
}

impl Notice {
    pub fn new(kind: EventKind, task_id: TaskId, at_ms: u64, attrs: Value) -> Self {
        Self {
            task_id,
            kind,
            at_ms,
            attrs,
        }
    }

    /// The JSON envelope mirrored onto the external backplane.
    pub fn envelope(&self) -> Value {
        serde_json::json!({
            "v": ENVELOPE_VERSION,
            "kind": self.kind,
            "task_id": self.task_id,
            "instant": format_iso_ms(self.at_ms),
            "attrs": self.attrs,
        })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
