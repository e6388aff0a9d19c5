// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron scheduler: declarative schedule rows in, at-most-once task
//! submissions out.
//!
//! Firing protocol, per due schedule:
//! 1. conflict gate — skip submission while a pending task or a recently
//!    started running task exists for the schedule (the reservation below
//!    still advances `next_run`);
//! 2. reserve — CAS on `(id, last_run)`; a lost race aborts the firing;
//! 3. submit — hand a TaskRequest to the dispatcher; rejection is surfaced
//!    as an event and `next_run` is not rolled back (the next cron firing
//!    is the retry).

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::NoticeTx;
use chrono::TimeZone;
use std::collections::HashMap;
use std::sync::Arc;
use sui_core::{
    Clock, CronExpr, EventKind, IdGen, Notice, Schedule, ScheduleId, TaskId, TaskRequest, UuidIdGen,
};
use sui_storage::Store;

pub struct Scheduler<C: Clock> {
    store: Store,
    clock: C,
    config: Arc<EngineConfig>,
    dispatcher: Arc<Dispatcher<C>>,
    notice_tx: NoticeTx,
    idgen: UuidIdGen,
    /// Cache refreshed from the store every sync interval.
    schedules: Vec<Schedule>,
    /// Parsed expressions, keyed by schedule id, rebuilt on refresh.
    parsed: HashMap<ScheduleId, CronExpr>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        store: Store,
        clock: C,
        config: Arc<EngineConfig>,
        dispatcher: Arc<Dispatcher<C>>,
        notice_tx: NoticeTx,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            dispatcher,
            notice_tx,
            idgen: UuidIdGen,
            schedules: Vec::new(),
            parsed: HashMap::new(),
        }
    }

    /// Run the refresh/tick loops until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut refresh = tokio::time::interval(self.config.sync_interval);
        let mut tick = tokio::time::interval(self.config.tick_interval);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh() {
                        tracing::warn!(error = %e, "schedule refresh failed");
                    }
                }
                _ = tick.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Reload active schedules from the store, parse their expressions,
    /// and initialise missing `next_run` stamps.
    pub fn refresh(&mut self) -> Result<(), EngineError> {
        let mut schedules = self.store.active_schedules()?;
        let mut parsed = HashMap::new();

        for schedule in &mut schedules {
            let expr = match CronExpr::parse(&schedule.cron_expr) {
                Ok(expr) => expr,
                Err(e) => {
                    tracing::warn!(
                        schedule_id = %schedule.id,
                        cron = %schedule.cron_expr,
                        error = %e,
                        "invalid cron expression, schedule skipped"
                    );
                    continue;
                }
            };

            if schedule.next_run_ms.is_none() {
                if let Some(next) = self.next_after_ms(&expr, self.clock.epoch_ms()) {
                    // Lost initialisation races just mean another instance
                    // already stamped it; re-read on the next refresh.
                    if self.store.init_next_run(&schedule.id, next)? {
                        schedule.next_run_ms = Some(next);
                    }
                }
            }
            parsed.insert(schedule.id.clone(), expr);
        }

        tracing::debug!(count = parsed.len(), "schedules refreshed");
        self.schedules = schedules;
        self.parsed = parsed;
        Ok(())
    }

    /// Fire every due schedule once. Store unavailability aborts the whole
    /// tick; schedules never fire speculatively.
    pub fn tick(&mut self) {
        let now_ms = self.clock.epoch_ms();
        let due: Vec<Schedule> = self
            .schedules
            .iter()
            .filter(|s| s.is_due(now_ms))
            .cloned()
            .collect();

        for schedule in due {
            match self.fire(&schedule, now_ms) {
                Ok(Some(task_id)) => {
                    tracing::info!(
                        schedule_id = %schedule.id,
                        %task_id,
                        "schedule fired"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %e, "tick aborted");
                    return;
                }
            }
        }
    }

    /// Execute the firing protocol for one due schedule. Returns the
    /// submitted task id, or None when the firing was skipped.
    fn fire(&mut self, schedule: &Schedule, now_ms: u64) -> Result<Option<TaskId>, EngineError> {
        let Some(expr) = self.parsed.get(&schedule.id) else {
            return Ok(None);
        };

        // 1. Conflict gate.
        let window_start = now_ms.saturating_sub(self.config.conflict_window.as_millis() as u64);
        let conflicted = self
            .store
            .has_recent_active_for_schedule(&schedule.id, window_start)?;

        // 2. Reserve. The advance happens even for a gated firing so the
        //    schedule keeps walking its cron grid.
        let next_run = self.next_after_ms(expr, now_ms);
        let reserved = self.store.reserve_firing(
            &schedule.id,
            schedule.last_run_ms,
            now_ms,
            next_run,
        )?;
        if !reserved {
            tracing::debug!(schedule_id = %schedule.id, "lost firing race, skipping");
            self.update_cached(&schedule.id, now_ms, next_run);
            return Ok(None);
        }
        self.update_cached(&schedule.id, now_ms, next_run);

        if conflicted {
            tracing::info!(
                schedule_id = %schedule.id,
                "previous run still active, firing skipped"
            );
            return Ok(None);
        }

        // 3. Submit.
        let task_id = TaskId::new(self.idgen.next());
        let request = TaskRequest {
            task_id: task_id.clone(),
            project_id: schedule.project_id.clone(),
            spider_id: schedule.spider_id.clone(),
            schedule_id: Some(schedule.id.clone()),
            owner: schedule.owner.clone(),
            settings_override: None,
        };

        match self.dispatcher.accept(request) {
            Ok(()) => {
                self.emit_fired(&schedule.id, &task_id, now_ms, true, None);
                Ok(Some(task_id))
            }
            Err(EngineError::Backpressure) => {
                // 4. No rollback; surface and let the next firing retry.
                tracing::warn!(schedule_id = %schedule.id, "dispatcher rejected firing (backpressure)");
                self.emit_fired(&schedule.id, &task_id, now_ms, false, Some("backpressure"));
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    fn update_cached(&mut self, id: &ScheduleId, last_run: u64, next_run: Option<u64>) {
        if let Some(cached) = self.schedules.iter_mut().find(|s| &s.id == id) {
            cached.last_run_ms = Some(last_run);
            cached.next_run_ms = next_run;
        }
    }

    fn emit_fired(
        &self,
        schedule_id: &ScheduleId,
        task_id: &TaskId,
        at_ms: u64,
        submitted: bool,
        reason: Option<&str>,
    ) {
        let mut attrs = serde_json::json!({
            "schedule_id": schedule_id,
            "submitted": submitted,
        });
        if let Some(reason) = reason {
            attrs["reason"] = serde_json::Value::String(reason.to_string());
        }
        let notice = Notice::new(EventKind::ScheduleFired, task_id.clone(), at_ms, attrs);
        if self.notice_tx.try_send(notice).is_err() {
            tracing::debug!(%schedule_id, "notice channel full, schedule_fired dropped");
        }
    }

    /// Next firing strictly after `after_ms`, in the configured timezone.
    fn next_after_ms(&self, expr: &CronExpr, after_ms: u64) -> Option<u64> {
        let tz = self.config.timezone;
        let after = tz
            .timestamp_millis_opt(after_ms as i64)
            .single()?;
        let next = expr.next_after(after)?;
        u64::try_from(next.timestamp_millis()).ok()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
