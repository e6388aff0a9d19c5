// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task execution: spawn the scraper, tail its output, classify the
//! outcome.
//!
//! Outcome rules:
//! - spawn failure → Failed (the timeline never loses a requested run)
//! - exit 0 with the output file in place → Finished
//! - stdout activity but no output file → Failed regardless of exit code
//! - non-zero exit → Failed; the reconciler repairs to Finished later if
//!   results were ingested
//! - cancel → SIGTERM, grace period, SIGKILL → Cancelled
//! - task timeout → same escalation → Failed

use crate::config::EngineConfig;
use crate::pipeline;
use crate::tailer::{self, TailerParams};
use crate::NoticeTx;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use sui_adapters::{ScraperProcess, SpawnSpec};
use sui_core::{Clock, EventKind, Notice, TaskId, TaskRequest, TaskStatus};
use sui_storage::{Store, StoreError};
use tokio::sync::watch;

/// How the supervised subprocess ended.
enum Exit {
    Status(ExitStatus),
    WaitFailed(String),
    Cancelled,
    TimedOut,
}

pub(crate) async fn run_task<C: Clock>(
    store: &Store,
    clock: &C,
    config: &Arc<EngineConfig>,
    notice_tx: &NoticeTx,
    request: TaskRequest,
    cancel_rx: watch::Receiver<bool>,
) {
    let task_id = request.task_id.clone();
    if let Err(e) = run_task_inner(store, clock, config, notice_tx, request, cancel_rx).await {
        // A task-scoped failure: record it and move on. The store guard
        // keeps an already-terminal row untouched.
        let message = match &e {
            StoreFlavoured::Store(StoreError::Transient(_)) => "store unavailable".to_string(),
            StoreFlavoured::Store(err) => format!("store error: {err}"),
            StoreFlavoured::Other(msg) => msg.clone(),
        };
        tracing::warn!(%task_id, error = %message, "task run failed");
        let _ = store.finish_task(&task_id, TaskStatus::Failed, clock.epoch_ms(), Some(&message));
        emit(
            notice_tx,
            EventKind::TaskFailed,
            &task_id,
            clock.epoch_ms(),
            serde_json::json!({"error": message}),
        )
        .await;
    }
}

/// Internal error carrier: store errors keep their taxonomy for the
/// user-visible message, everything else is already a sentence.
enum StoreFlavoured {
    Store(StoreError),
    Other(String),
}

impl From<StoreError> for StoreFlavoured {
    fn from(e: StoreError) -> Self {
        StoreFlavoured::Store(e)
    }
}

async fn run_task_inner<C: Clock>(
    store: &Store,
    clock: &C,
    config: &Arc<EngineConfig>,
    notice_tx: &NoticeTx,
    request: TaskRequest,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<(), StoreFlavoured> {
    let task_id = request.task_id.clone();

    // The external API may have cancelled the task while it sat queued.
    let task = store.task(&task_id)?;
    if task.status != TaskStatus::Pending {
        tracing::info!(%task_id, status = %task.status, "skipping dequeued task, no longer pending");
        return Ok(());
    }

    let spider = store.spider(&request.spider_id)?;
    let project = store.project(&request.project_id)?;

    // Resolve the on-disk project directory and the per-task output file.
    let project_dir = config.projects_root.join(&project.path);
    std::fs::create_dir_all(&project_dir)
        .map_err(|e| StoreFlavoured::Other(format!("project dir: {e}")))?;
    let output_path = project_dir.join(format!("results_{task_id}.jsonl"));
    store.set_task_output_path(&task_id, &output_path)?;

    let database_url = if project.persist_results {
        config.database_url.as_deref()
    } else {
        None
    };
    let pipeline_config = pipeline::materialize(
        &project_dir,
        &project,
        &spider,
        &task,
        &output_path,
        database_url,
    )
    .map_err(|e| StoreFlavoured::Other(format!("pipeline config: {e}")))?;

    let crawl_start = sui_core::clock::format_iso_ms(clock.epoch_ms());
    let mut env = vec![
        ("TASK_ID".to_string(), task_id.to_string()),
        (
            "OUTPUT_FILE".to_string(),
            output_path.to_string_lossy().into_owned(),
        ),
        ("CRAWL_START".to_string(), crawl_start),
    ];
    if let Some(url) = database_url {
        env.push(("DATABASE_URL".to_string(), url.to_string()));
    }

    let mut args = config.scraper_args.clone();
    args.push(spider.name.clone());
    args.push("--pipeline-config".to_string());
    args.push(pipeline_config.to_string_lossy().into_owned());

    let spec = SpawnSpec {
        command: config.scraper_command.clone(),
        args,
        cwd: project_dir,
        env,
    };

    let mut process = match ScraperProcess::spawn(spec, config.spawn_timeout).await {
        Ok(p) => p,
        Err(e) => {
            return Err(StoreFlavoured::Other(format!("spawn: {e}")));
        }
    };

    let started_at = clock.epoch_ms();
    store.mark_task_running(&task_id, started_at)?;
    emit(
        notice_tx,
        EventKind::TaskStarted,
        &task_id,
        started_at,
        serde_json::json!({"spider": spider.name, "project": project.name}),
    )
    .await;

    let tailer = tailer::spawn(TailerParams {
        store: store.clone(),
        clock: clock.clone(),
        config: Arc::clone(config),
        task_id: task_id.clone(),
        path: output_path.clone(),
        notice_tx: notice_tx.clone(),
    });

    let exit = supervise(&mut process, &mut cancel_rx, config).await;

    // Let the tailer finish what already reached disk, even on cancel.
    let ingest = tailer.drain().await;

    // The store count is authoritative for the final statistics.
    let items = store.count_results_for_task(&task_id)?;
    let stderr_tail = process.stderr_tail();

    let (status, error_message) = classify(&exit, &output_path, process.wrote_stdout());

    let finished_at = clock.epoch_ms();
    store.set_task_counts(&task_id, items, ingest.requests, ingest.parse_errors)?;
    store.finish_task(&task_id, status, finished_at, error_message.as_deref())?;

    let kind = match status {
        TaskStatus::Failed => EventKind::TaskFailed,
        _ => EventKind::TaskFinished,
    };
    let mut attrs = serde_json::json!({
        "status": status.to_string(),
        "items": items,
        "errors": ingest.parse_errors,
    });
    if let Some(msg) = &error_message {
        attrs["error"] = serde_json::Value::String(msg.clone());
        if !stderr_tail.is_empty() {
            attrs["stderr_tail"] = serde_json::Value::String(stderr_tail);
        }
    }
    emit(notice_tx, kind, &task_id, finished_at, attrs).await;

    tracing::info!(%task_id, status = %status, items, "task complete");
    Ok(())
}

/// Wait for exit, cancellation, or the hard deadline. Cancellation and
/// timeout both escalate SIGTERM → grace → SIGKILL.
async fn supervise(
    process: &mut ScraperProcess,
    cancel_rx: &mut watch::Receiver<bool>,
    config: &EngineConfig,
) -> Exit {
    let deadline = tokio::time::sleep(config.task_timeout);
    tokio::pin!(deadline);

    tokio::select! {
        status = process.wait() => match status {
            Ok(s) => Exit::Status(s),
            Err(e) => Exit::WaitFailed(e.to_string()),
        },
        _ = wait_for_cancel(cancel_rx) => {
            escalate(process, config.hard_kill_grace_period).await;
            Exit::Cancelled
        }
        _ = &mut deadline => {
            tracing::warn!("task deadline reached, terminating scraper");
            escalate(process, config.hard_kill_grace_period).await;
            Exit::TimedOut
        }
    }
}

async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // Sender gone; nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM, wait out the grace period, then SIGKILL if still alive.
async fn escalate(process: &mut ScraperProcess, grace: Duration) {
    process.terminate();
    if tokio::time::timeout(grace, process.wait()).await.is_err() {
        tracing::warn!("grace period expired, sending SIGKILL");
        process.kill();
        let _ = process.wait().await;
    }
}

fn classify(exit: &Exit, output_path: &Path, wrote_stdout: bool) -> (TaskStatus, Option<String>) {
    match exit {
        Exit::Cancelled => (TaskStatus::Cancelled, Some("cancelled".to_string())),
        Exit::TimedOut => (TaskStatus::Failed, Some("task timeout".to_string())),
        Exit::WaitFailed(e) => (TaskStatus::Failed, Some(format!("wait failed: {e}"))),
        Exit::Status(status) => {
            if !output_path.exists() && wrote_stdout {
                return (
                    TaskStatus::Failed,
                    Some("no output file produced".to_string()),
                );
            }
            if status.success() {
                (TaskStatus::Finished, None)
            } else {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                // Failed even when items were ingested; the reconciler
                // repairs that case to Finished.
                (TaskStatus::Failed, Some(format!("exit code {code}")))
            }
        }
    }
}

async fn emit(
    notice_tx: &NoticeTx,
    kind: EventKind,
    task_id: &TaskId,
    at_ms: u64,
    attrs: serde_json::Value,
) {
    let _ = notice_tx
        .send(Notice::new(kind, task_id.clone(), at_ms, attrs))
        .await;
}
