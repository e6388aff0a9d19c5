// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity and its lifecycle state machine.

use crate::id::{OwnerId, ProjectId, ScheduleId, SpiderId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status of a task through its lifecycle.
///
/// Pending → Running → {Finished, Failed, Cancelled}. Terminal states are
/// sticky, with one exception: the reconciler may repair Failed → Finished
/// when an exit-code failure turns out to have ingested results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Check if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the lifecycle permits a direct transition to `next`.
    ///
    /// The Failed → Finished edge is the reconciler's repair path and is
    /// only legal in that direction; nothing ever reopens a Finished or
    /// Cancelled task.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Finished)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Failed, Finished)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Finished => write!(f, "finished"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "finished" => Ok(TaskStatus::Finished),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A request to execute one spider run, handed from the scheduler (or an
/// ad-hoc caller) to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub spider_id: SpiderId,
    /// Present only when produced by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<ScheduleId>,
    pub owner: OwnerId,
    /// Settings overrides layered over the spider's own settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_override: Option<serde_json::Value>,
}

/// One execution attempt of a spider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub spider_id: SpiderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<ScheduleId>,
    pub owner: OwnerId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    pub items_count: u64,
    pub requests_count: u64,
    pub error_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_override: Option<serde_json::Value>,
    /// Absolute path of the JSONL output file, set when the runner
    /// resolves the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl Task {
    /// Create a Pending task from an accepted request.
    pub fn from_request(req: &TaskRequest) -> Self {
        Self {
            id: req.task_id.clone(),
            project_id: req.project_id.clone(),
            spider_id: req.spider_id.clone(),
            schedule_id: req.schedule_id.clone(),
            owner: req.owner.clone(),
            status: TaskStatus::Pending,
            started_at_ms: None,
            finished_at_ms: None,
            items_count: 0,
            requests_count: 0,
            error_count: 0,
            error_message: None,
            settings_override: req.settings_override.clone(),
            output_path: None,
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
