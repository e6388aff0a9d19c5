// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component wiring and startup/shutdown ordering.
//!
//! `startup` builds one `Core` value holding every shared handle and
//! passes it down explicitly; there is no module-level mutable state. The
//! lock file makes this process the only scheduler over its data
//! directory (single-process deployments are therefore always leader).

use crate::bus::{self, Bus};
use crate::config::Config;
use crate::gateway;
use fs2::FileExt;
use std::fs::File;
use std::sync::Arc;
use sui_engine::{ActiveTasks, Dispatcher, Reconciler, Retention, Scheduler};
use sui_core::SystemClock;
use sui_storage::Store;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another daemon already holds {0}")]
    LockFailed(String),
    #[error("store error: {0}")]
    Store(#[from] sui_storage::StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled execution core.
pub struct Core {
    pub store: Store,
    pub bus: Bus,
    pub dispatcher: Arc<Dispatcher<SystemClock>>,
    pub active: ActiveTasks,
    shutdown_tx: watch::Sender<bool>,
    _lock_file: File,
}

impl Core {
    /// Signal every background loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Bring up every component in dependency order.
pub async fn startup(config: &Config) -> Result<Core, LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.engine.projects_root)?;

    // One daemon per data dir.
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.display().to_string()))?;

    let store = Store::open(&config.db_path)?;
    let engine_config = Arc::new(config.engine.clone());

    let (notice_tx, notice_rx) = tokio::sync::mpsc::channel(1024);
    let bus = Bus::new(store.clone());
    bus::spawn_pump(bus.clone(), notice_rx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        SystemClock,
        Arc::clone(&engine_config),
        notice_tx.clone(),
    ));
    dispatcher.start();
    let active = dispatcher.active();

    let scheduler = Scheduler::new(
        store.clone(),
        SystemClock,
        Arc::clone(&engine_config),
        Arc::clone(&dispatcher),
        notice_tx.clone(),
    );
    tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let reconciler = Reconciler::new(
        store.clone(),
        SystemClock,
        Arc::clone(&engine_config),
        active.clone(),
        notice_tx.clone(),
    );
    tokio::spawn(reconciler.run(shutdown_rx.clone()));

    let retention = Retention::new(SystemClock, Arc::clone(&engine_config), active.clone());
    tokio::spawn(retention.run(shutdown_rx.clone()));

    if let Some(addr) = &config.gateway_addr {
        let addr = addr.clone();
        let gateway_bus = bus.clone();
        tokio::spawn(async move {
            gateway::run(&addr, gateway_bus, shutdown_rx).await;
        });
    }

    tracing::info!(
        db = %config.db_path.display(),
        projects_root = %config.engine.projects_root.display(),
        workers = config.engine.max_concurrent_tasks,
        "core started"
    );

    Ok(Core {
        store,
        bus,
        dispatcher,
        active,
        shutdown_tx,
        _lock_file: lock_file,
    })
}
