// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic repair of disagreements between declared and observable state.
//!
//! Four sweeps over a sliding window of tasks:
//! - stuck: Running with no live process and an old `started_at` → Failed;
//! - underreported success: Failed with zero items but parseable output on
//!   disk → drain, then repair to Finished;
//! - duplicate sentinel: extra `(task, fingerprint)` rows pruned, oldest
//!   kept;
//! - count drift: `items_count` overwritten with the actual row count.
//!
//! Nothing here deletes tasks or results without a detectable defect, and
//! a zero-result failure is never force-finished.

use crate::config::EngineConfig;
use crate::dispatcher::ActiveTasks;
use crate::tailer;
use crate::NoticeTx;
use std::sync::Arc;
use sui_core::{Clock, EventKind, Notice, Task, TaskStatus};
use sui_storage::Store;

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub stuck_failed: u64,
    pub repaired_finished: u64,
    pub duplicates_removed: u64,
    pub counts_fixed: u64,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Reconciler<C: Clock> {
    store: Store,
    clock: C,
    config: Arc<EngineConfig>,
    active: ActiveTasks,
    notice_tx: NoticeTx,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(
        store: Store,
        clock: C,
        config: Arc<EngineConfig>,
        active: ActiveTasks,
        notice_tx: NoticeTx,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            active,
            notice_tx,
        }
    }

    /// Run passes on the configured interval until shutdown.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.reconcile_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_once().await;
                    if !report.is_clean() {
                        tracing::info!(?report, "reconciliation repaired state");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("reconciler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One full pass. Each sweep is independent; a store error aborts only
    /// the sweep it occurred in.
    pub async fn run_once(&self) -> RepairReport {
        let mut report = RepairReport::default();
        let now_ms = self.clock.epoch_ms();

        self.sweep_stuck(now_ms, &mut report);
        self.sweep_underreported(now_ms, &mut report).await;
        self.sweep_duplicates_and_drift(now_ms, &mut report);

        report
    }

    /// Running, not in the dispatcher's live table, started too long ago.
    fn sweep_stuck(&self, now_ms: u64, report: &mut RepairReport) {
        let cutoff = now_ms.saturating_sub(self.config.stuck_timeout.as_millis() as u64);
        let candidates = match self.store.running_tasks_started_before(cutoff) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "stuck sweep aborted");
                return;
            }
        };

        for task in candidates {
            if self.active.contains(&task.id) {
                continue;
            }
            match self
                .store
                .finish_task(&task.id, TaskStatus::Failed, now_ms, Some("no heartbeat"))
            {
                Ok(true) => {
                    report.stuck_failed += 1;
                    tracing::warn!(task_id = %task.id, "stuck task marked failed");
                    self.emit_repaired(&task, now_ms, "stuck_failed");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "stuck repair failed");
                }
            }
        }
    }

    /// Failed with zero items but output on disk: drain it, and if rows
    /// were ingested flip the failure to Finished. Only exit-code failures
    /// are eligible; spawn and heartbeat failures have no output to trust.
    async fn sweep_underreported(&self, now_ms: u64, report: &mut RepairReport) {
        let since = now_ms.saturating_sub(self.config.reconcile_window.as_millis() as u64);
        let terminal = match self.store.terminal_tasks_since(since) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "underreported sweep aborted");
                return;
            }
        };

        for task in terminal {
            if task.status != TaskStatus::Failed {
                continue;
            }
            // Eligibility: the failure must be exit-code based. Spawn and
            // heartbeat failures have no trustworthy output.
            if !task
                .error_message
                .as_deref()
                .is_some_and(|m| m.starts_with("exit code"))
            {
                continue;
            }

            // Already-ingested results make the repair immediate.
            let ingested = if task.items_count > 0 {
                task.items_count
            } else {
                // Zero on record: check the file itself before giving up.
                let Some(path) = task.output_path.clone() else {
                    continue;
                };
                if !path.exists() {
                    continue;
                }
                let stats = tailer::drain_file_once(
                    &self.store,
                    &self.clock,
                    &self.config,
                    &task.id,
                    &path,
                )
                .await;
                if stats.ingested == 0 {
                    continue;
                }
                if let Err(e) = self.store.set_task_items_count(&task.id, stats.total) {
                    tracing::warn!(task_id = %task.id, error = %e, "items_count update failed");
                }
                stats.ingested
            };

            match self.store.repair_task_finished(&task.id) {
                Ok(true) => {
                    report.repaired_finished += 1;
                    tracing::info!(
                        task_id = %task.id,
                        ingested,
                        "failed task has ingested results, repaired to finished"
                    );
                    self.emit_repaired(&task, now_ms, "exit_code_repair");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "repair transition failed");
                }
            }
        }
    }

    /// Duplicate sentinel first, then count drift, so one pass converges.
    fn sweep_duplicates_and_drift(&self, now_ms: u64, report: &mut RepairReport) {
        let since = now_ms.saturating_sub(self.config.reconcile_window.as_millis() as u64);
        let terminal = match self.store.terminal_tasks_since(since) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "drift sweep aborted");
                return;
            }
        };

        for task in terminal {
            match self.store.prune_duplicate_results(&task.id) {
                Ok(0) => {}
                Ok(removed) => {
                    report.duplicates_removed += removed;
                    tracing::info!(task_id = %task.id, removed, "duplicate results pruned");
                    self.emit_repaired(&task, now_ms, "duplicates_pruned");
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "duplicate prune failed");
                    continue;
                }
            }

            let actual = match self.store.count_results_for_task(&task.id) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "count check failed");
                    continue;
                }
            };
            if actual != task.items_count {
                if let Err(e) = self.store.set_task_items_count(&task.id, actual) {
                    tracing::warn!(task_id = %task.id, error = %e, "count fix failed");
                    continue;
                }
                report.counts_fixed += 1;
                tracing::info!(
                    task_id = %task.id,
                    declared = task.items_count,
                    actual,
                    "items_count drift corrected"
                );
                self.emit_repaired(&task, now_ms, "count_drift");
            }
        }
    }

    fn emit_repaired(&self, task: &Task, at_ms: u64, action: &str) {
        let notice = Notice::new(
            EventKind::TaskRepaired,
            task.id.clone(),
            at_ms,
            serde_json::json!({"action": action}),
        );
        if self.notice_tx.try_send(notice).is_err() {
            tracing::debug!(task_id = %task.id, "notice channel full, task_repaired dropped");
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
