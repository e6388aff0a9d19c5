// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process notification bus.
//!
//! A topic tree keyed by task id plus a wildcard topic. Delivery is
//! best-effort over `tokio::sync::broadcast`: a subscriber that cannot
//! keep up is lagged out, never awaited. Every published notice is also
//! appended to the store's event log.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sui_core::Notice;
use sui_storage::Store;
use tokio::sync::{broadcast, mpsc};

/// Per-topic buffer before slow subscribers start losing notices.
const TOPIC_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    store: Store,
    all: broadcast::Sender<Notice>,
    topics: Mutex<HashMap<String, broadcast::Sender<Notice>>>,
}

impl Bus {
    pub fn new(store: Store) -> Self {
        let (all, _) = broadcast::channel(TOPIC_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                store,
                all,
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Publish one notice: event log first, then fan-out.
    pub fn publish(&self, notice: &Notice) {
        if let Err(e) = self.inner.store.append_event(notice) {
            tracing::warn!(task_id = %notice.task_id, error = %e, "event log append failed");
        }

        let _ = self.inner.all.send(notice.clone());

        let mut topics = self.inner.topics.lock();
        if let Some(sender) = topics.get(notice.task_id.as_str()) {
            if sender.send(notice.clone()).is_err() {
                // Last per-task subscriber went away; drop the topic.
                topics.remove(notice.task_id.as_str());
            }
        }
    }

    /// Subscribe to a single task's notices.
    pub fn subscribe_task(&self, task_id: &str) -> broadcast::Receiver<Notice> {
        let mut topics = self.inner.topics.lock();
        topics
            .entry(task_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Subscribe to everything.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Notice> {
        self.inner.all.subscribe()
    }
}

/// Pump engine notices into the bus until the channel closes.
pub fn spawn_pump(bus: Bus, mut notice_rx: mpsc::Receiver<Notice>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            bus.publish(&notice);
        }
        tracing::debug!("notice channel closed, bus pump exiting");
    })
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
