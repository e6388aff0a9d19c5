// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending_to_running = { TaskStatus::Pending, TaskStatus::Running, true },
    pending_to_failed = { TaskStatus::Pending, TaskStatus::Failed, true },
    pending_to_cancelled = { TaskStatus::Pending, TaskStatus::Cancelled, true },
    pending_to_finished = { TaskStatus::Pending, TaskStatus::Finished, false },
    running_to_finished = { TaskStatus::Running, TaskStatus::Finished, true },
    running_to_failed = { TaskStatus::Running, TaskStatus::Failed, true },
    running_to_cancelled = { TaskStatus::Running, TaskStatus::Cancelled, true },
    failed_repair = { TaskStatus::Failed, TaskStatus::Finished, true },
    finished_is_sticky = { TaskStatus::Finished, TaskStatus::Failed, false },
    finished_never_reruns = { TaskStatus::Finished, TaskStatus::Running, false },
    cancelled_is_sticky = { TaskStatus::Cancelled, TaskStatus::Finished, false },
    failed_never_reruns = { TaskStatus::Failed, TaskStatus::Running, false },
)]
fn transitions(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_states() {
    assert!(!TaskStatus::Pending.is_terminal());
    assert!(!TaskStatus::Running.is_terminal());
    assert!(TaskStatus::Finished.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
}

#[test]
fn status_round_trips_through_str() {
    for status in [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Finished,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ] {
        let text = status.to_string();
        assert_eq!(text.parse::<TaskStatus>(), Ok(status));
    }
    assert!("bogus".parse::<TaskStatus>().is_err());
}

#[test]
fn from_request_creates_pending_task() {
    let req = TaskRequest {
        task_id: TaskId::new("t-1"),
        project_id: ProjectId::new("p-1"),
        spider_id: SpiderId::new("s-1"),
        schedule_id: Some(ScheduleId::new("sch-1")),
        owner: OwnerId::new("o-1"),
        settings_override: Some(serde_json::json!({"DELAY": 2})),
    };
    let task = Task::from_request(&req);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.id, "t-1");
    assert_eq!(task.schedule_id.as_ref().map(|s| s.as_str()), Some("sch-1"));
    assert_eq!(task.items_count, 0);
    assert!(task.started_at_ms.is_none());
    assert!(task.output_path.is_none());
}
