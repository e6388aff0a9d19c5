// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool dispatching task requests to scraper runs.
//!
//! Accept path: reserve a queue slot first, persist the Pending task row,
//! then hand the reservation its request — so a full queue rejects with
//! Backpressure before any row exists, and an accepted request always has
//! a persisted task. One runner loop per worker slot consumes the queue.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::runner;
use crate::NoticeTx;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sui_core::{Clock, ProjectId, Task, TaskId, TaskRequest};
use sui_storage::Store;
use tokio::sync::{mpsc, watch};

/// Registry of live task executions.
///
/// Single-writer (the runner loops), many-reader: the reconciler checks
/// process liveness against it and retention skips files it lists.
#[derive(Clone, Default)]
pub struct ActiveTasks {
    inner: Arc<Mutex<HashMap<TaskId, ActiveEntry>>>,
}

struct ActiveEntry {
    project_id: ProjectId,
    cancel_tx: watch::Sender<bool>,
}

/// Outcome of a registration attempt.
pub(crate) enum Registration {
    Registered(watch::Receiver<bool>),
    /// The project is at its concurrency limit; try again later.
    ProjectSaturated,
    /// A runner for this task id already exists (a defect).
    Duplicate,
}

impl ActiveTasks {
    /// Atomically register a task, enforcing the optional per-project
    /// limit under the same lock so two workers cannot both slip in.
    pub(crate) fn register(
        &self,
        task_id: &TaskId,
        project_id: &ProjectId,
        per_project_limit: Option<usize>,
    ) -> Registration {
        let mut map = self.inner.lock();
        if map.contains_key(task_id) {
            tracing::error!(%task_id, "task already active, refusing duplicate runner");
            return Registration::Duplicate;
        }
        if let Some(limit) = per_project_limit {
            let running = map.values().filter(|e| &e.project_id == project_id).count();
            if running >= limit {
                return Registration::ProjectSaturated;
            }
        }
        let (cancel_tx, cancel_rx) = watch::channel(false);
        map.insert(
            task_id.clone(),
            ActiveEntry {
                project_id: project_id.clone(),
                cancel_tx,
            },
        );
        Registration::Registered(cancel_rx)
    }

    pub(crate) fn remove(&self, task_id: &TaskId) {
        self.inner.lock().remove(task_id);
    }

    /// Whether the dispatcher currently supervises this task.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.inner.lock().contains_key(task_id)
    }

    /// Ids of all live tasks.
    pub fn ids(&self) -> Vec<TaskId> {
        self.inner.lock().keys().cloned().collect()
    }

    pub fn count_for_project(&self, project_id: &ProjectId) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|e| &e.project_id == project_id)
            .count()
    }

    /// Request cancellation of a live task. Returns false when the task
    /// is not currently supervised.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let map = self.inner.lock();
        match map.get(task_id) {
            Some(entry) => entry.cancel_tx.send(true).is_ok(),
            None => false,
        }
    }
}

/// The worker pool.
pub struct Dispatcher<C: Clock> {
    store: Store,
    clock: C,
    config: Arc<EngineConfig>,
    notice_tx: NoticeTx,
    active: ActiveTasks,
    queue_tx: mpsc::Sender<TaskRequest>,
    queue_rx: Mutex<Option<mpsc::Receiver<TaskRequest>>>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(store: Store, clock: C, config: Arc<EngineConfig>, notice_tx: NoticeTx) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        Self {
            store,
            clock,
            config,
            notice_tx,
            active: ActiveTasks::default(),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// The shared live-task registry.
    pub fn active(&self) -> ActiveTasks {
        self.active.clone()
    }

    /// Submit a request. Synchronous rejection with [`EngineError::Backpressure`]
    /// when the queue is full; otherwise the Pending task row is persisted
    /// before the request is enqueued.
    pub fn accept(&self, request: TaskRequest) -> Result<(), EngineError> {
        let permit = self
            .queue_tx
            .try_reserve()
            .map_err(|_| EngineError::Backpressure)?;
        self.store.insert_task(&Task::from_request(&request))?;
        tracing::info!(task_id = %request.task_id, spider_id = %request.spider_id, "task accepted");
        permit.send(request);
        Ok(())
    }

    /// Request cancellation of a running task.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        self.active.cancel(task_id)
    }

    /// Spawn the worker loops. Call once; returns immediately.
    pub fn start(&self) {
        let Some(queue_rx) = self.queue_rx.lock().take() else {
            tracing::error!("dispatcher started twice");
            return;
        };
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        for slot in 0..self.config.max_concurrent_tasks {
            let worker = Worker {
                store: self.store.clone(),
                clock: self.clock.clone(),
                config: Arc::clone(&self.config),
                notice_tx: self.notice_tx.clone(),
                active: self.active.clone(),
            };
            let queue_rx = Arc::clone(&queue_rx);
            tokio::spawn(worker.run(slot, queue_rx));
        }
    }
}

/// One worker slot's clone of the shared handles.
struct Worker<C: Clock> {
    store: Store,
    clock: C,
    config: Arc<EngineConfig>,
    notice_tx: NoticeTx,
    active: ActiveTasks,
}

impl<C: Clock> Worker<C> {
    async fn run(
        self,
        slot: usize,
        queue_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<TaskRequest>>>,
    ) {
        tracing::debug!(slot, "worker slot started");
        loop {
            let request = {
                let mut rx = queue_rx.lock().await;
                rx.recv().await
            };
            let Some(request) = request else {
                tracing::debug!(slot, "queue closed, worker exiting");
                return;
            };

            // Hold this worker slot until the project has room.
            let cancel_rx = loop {
                match self.active.register(
                    &request.task_id,
                    &request.project_id,
                    self.config.per_project_limit,
                ) {
                    Registration::Registered(rx) => break Some(rx),
                    Registration::Duplicate => break None,
                    Registration::ProjectSaturated => {
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            };
            let Some(cancel_rx) = cancel_rx else {
                continue;
            };

            let task_id = request.task_id.clone();
            runner::run_task(
                &self.store,
                &self.clock,
                &self.config,
                &self.notice_tx,
                request,
                cancel_rx,
            )
            .await;
            self.active.remove(&task_id);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
