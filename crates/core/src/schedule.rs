// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule entity: a cron-driven request to run a spider.

use crate::id::{OwnerId, ProjectId, ScheduleId, SpiderId};
use serde::{Deserialize, Serialize};

/// A declarative cron schedule.
///
/// The scheduler only ever writes `last_run_ms` and `next_run_ms`; every
/// other field belongs to the external API. `last_run_ms` doubles as the
/// compare-and-swap token that serialises concurrent firings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub project_id: ProjectId,
    pub spider_id: SpiderId,
    pub owner: OwnerId,
    pub name: String,
    /// 5-field cron expression, evaluated in the configured timezone.
    pub cron_expr: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_ms: Option<u64>,
}

impl Schedule {
    /// Whether this schedule is due at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.active && self.next_run_ms.is_some_and(|next| next <= now_ms)
    }
}
