// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity builders shared by other crates' tests.

use crate::{
    OwnerId, Project, ProjectId, Schedule, ScheduleId, Spider, SpiderId, Task, TaskRequest, TaskId,
};
use std::path::PathBuf;

pub fn project(id: &str, path: &str) -> Project {
    Project {
        id: ProjectId::new(id),
        name: id.to_string(),
        path: PathBuf::from(path),
        owner: OwnerId::new("owner-1"),
        persist_results: true,
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

pub fn spider(id: &str, project_id: &str, name: &str) -> Spider {
    Spider {
        id: SpiderId::new(id),
        project_id: ProjectId::new(project_id),
        name: name.to_string(),
        source: String::new(),
        settings: None,
        framework: None,
    }
}

pub fn schedule(id: &str, project_id: &str, spider_id: &str, cron_expr: &str) -> Schedule {
    Schedule {
        id: ScheduleId::new(id),
        project_id: ProjectId::new(project_id),
        spider_id: SpiderId::new(spider_id),
        owner: OwnerId::new("owner-1"),
        name: id.to_string(),
        cron_expr: cron_expr.to_string(),
        active: true,
        last_run_ms: None,
        next_run_ms: None,
    }
}

pub fn task_request(task_id: &str, project_id: &str, spider_id: &str) -> TaskRequest {
    TaskRequest {
        task_id: TaskId::new(task_id),
        project_id: ProjectId::new(project_id),
        spider_id: SpiderId::new(spider_id),
        schedule_id: None,
        owner: OwnerId::new("owner-1"),
        settings_override: None,
    }
}

pub fn pending_task(task_id: &str, project_id: &str, spider_id: &str) -> Task {
    Task::from_request(&task_request(task_id, project_id, spider_id))
}
