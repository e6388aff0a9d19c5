// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task JSONL ingestion.
//!
//! One tailer per running task follows the append-only output file from a
//! byte cursor, keeping the last partial line buffered until its newline
//! arrives. Parsed records are deduplicated per task, batched, and flushed
//! to the store; every flush updates the task's `items_count` and emits
//! progress notices. A restarted tailer warms its dedup set from the
//! store's fingerprints and re-reads the file from offset zero, which makes
//! ingestion idempotent across crashes.

use crate::config::EngineConfig;
use crate::fingerprint::fingerprint;
use crate::NoticeTx;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sui_core::{Clock, EventKind, IdGen, Notice, Payload, ResultId, ResultRecord, TaskId, UuidIdGen};
use sui_storage::Store;
use tokio::sync::oneshot;

/// Interval for the file-appear wait loop.
const APPEAR_POLL: Duration = Duration::from_millis(100);

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    /// Rows written to the store by this tailer instance.
    pub ingested: u64,
    /// Total rows in the store for the task after draining.
    pub total: u64,
    /// Malformed JSONL lines (logged and skipped).
    pub parse_errors: u64,
    /// Requests counter from the scraper's trailing stats line, if any.
    pub requests: u64,
    /// Whether the output file ever appeared.
    pub file_appeared: bool,
}

/// Everything a tailer needs to run.
pub struct TailerParams<C: Clock> {
    pub store: Store,
    pub clock: C,
    pub config: Arc<EngineConfig>,
    pub task_id: TaskId,
    pub path: PathBuf,
    pub notice_tx: NoticeTx,
}

/// Control handle held by the runner. Dropping it without draining aborts
/// nothing; the tailer keeps following the file until drained.
pub struct TailerHandle {
    drain_tx: Option<oneshot::Sender<()>>,
    done_rx: oneshot::Receiver<IngestStats>,
}

impl TailerHandle {
    /// Signal the tailer to finish what is on disk and stop, then wait
    /// for its final stats.
    pub async fn drain(mut self) -> IngestStats {
        if let Some(tx) = self.drain_tx.take() {
            let _ = tx.send(());
        }
        self.done_rx.await.unwrap_or_default()
    }
}

/// Start a tailer task for `params.path`.
pub fn spawn<C: Clock>(params: TailerParams<C>) -> TailerHandle {
    let (drain_tx, drain_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let stats = run(params, drain_rx).await;
        let _ = done_tx.send(stats);
    });
    TailerHandle {
        drain_tx: Some(drain_tx),
        done_rx,
    }
}

/// One-shot drain used by the reconciler: read the whole file, ingest
/// everything new, and return. No watcher, no waiting.
pub async fn drain_file_once<C: Clock>(
    store: &Store,
    clock: &C,
    config: &EngineConfig,
    task_id: &TaskId,
    path: &Path,
) -> IngestStats {
    let (notice_tx, mut sink) = tokio::sync::mpsc::channel(64);
    // Notices from a repair drain are not interesting to subscribers;
    // drop them as they arrive.
    tokio::spawn(async move { while sink.recv().await.is_some() {} });

    let mut ingestor = Ingestor::new(
        store.clone(),
        clock.clone(),
        config,
        task_id.clone(),
        notice_tx,
    );
    if !path.exists() {
        return IngestStats::default();
    }
    ingestor.warm_from_store();
    ingestor.stats.file_appeared = true;
    ingestor.read_available(path);
    ingestor.flush_until_empty().await;
    ingestor.finish()
}

async fn run<C: Clock>(params: TailerParams<C>, mut drain_rx: oneshot::Receiver<()>) -> IngestStats {
    let TailerParams {
        store,
        clock,
        config,
        task_id,
        path,
        notice_tx,
    } = params;

    let mut ingestor = Ingestor::new(store, clock, &config, task_id.clone(), notice_tx);

    // Wait for the scraper to create its output file.
    let appear_deadline = tokio::time::Instant::now() + config.file_appear_timeout;
    let mut draining = false;
    while !path.exists() {
        if tokio::time::Instant::now() >= appear_deadline {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(APPEAR_POLL) => {}
            _ = &mut drain_rx => { draining = true; break; }
        }
    }

    if !path.exists() {
        // Keep waiting for the drain signal so the runner's handshake
        // stays uniform, then give a late-appearing file one last look.
        if !draining {
            let _ = (&mut drain_rx).await;
        }
        if path.exists() {
            ingestor.stats.file_appeared = true;
            ingestor.warm_from_store();
            ingestor.read_available(&path);
            ingestor.flush_until_empty().await;
        } else {
            tracing::debug!(task_id = %ingestor.task_id, path = %path.display(), "output file never appeared");
        }
        return ingestor.finish();
    }

    ingestor.stats.file_appeared = true;
    ingestor.warm_from_store();

    let mut watch = sui_adapters::FileWatch::start(&path);
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !draining {
        tokio::select! {
            _ = watch.changed() => {}
            _ = poll.tick() => {}
            _ = &mut drain_rx => { draining = true; }
        }
        // Past the pending cap, stop reading; the flush below is the only
        // way forward and the scraper eventually blocks on the filesystem.
        if ingestor.pending_bytes < config.max_pending_bytes {
            ingestor.read_available(&path);
        }
        if ingestor.should_flush() {
            ingestor.flush().await;
        }
    }

    // Drain: pick up whatever reached disk, then flush everything.
    ingestor.read_available(&path);
    ingestor.flush_until_empty().await;
    ingestor.finish()
}

/// Cursor-based reader plus dedup/batch/flush state.
struct Ingestor<C: Clock> {
    store: Store,
    clock: C,
    task_id: TaskId,
    notice_tx: NoticeTx,
    idgen: UuidIdGen,

    batch_max: usize,
    batch_interval: Duration,
    max_dedup_entries: usize,

    cursor: u64,
    partial: String,
    seen: HashSet<String>,
    batch: Vec<ResultRecord>,
    pending_bytes: usize,
    last_flush: tokio::time::Instant,
    total: u64,
    stats: IngestStats,
}

impl<C: Clock> Ingestor<C> {
    fn new(
        store: Store,
        clock: C,
        config: &EngineConfig,
        task_id: TaskId,
        notice_tx: NoticeTx,
    ) -> Self {
        Self {
            store,
            clock,
            task_id,
            notice_tx,
            idgen: UuidIdGen,
            batch_max: config.batch_max,
            batch_interval: config.batch_interval,
            max_dedup_entries: config.max_dedup_entries,
            cursor: 0,
            partial: String::new(),
            seen: HashSet::new(),
            batch: Vec::new(),
            pending_bytes: 0,
            last_flush: tokio::time::Instant::now(),
            total: 0,
            stats: IngestStats::default(),
        }
    }

    /// Re-populate the dedup set and cumulative count from rows already
    /// stored for this task. Required for crash recovery: a fresh tailer
    /// re-reads the file from zero and must not re-insert.
    fn warm_from_store(&mut self) {
        match self.store.fingerprints_for_task(&self.task_id) {
            Ok(fps) => {
                self.total = fps.len() as u64;
                for fp in fps.into_iter().take(self.max_dedup_entries) {
                    self.seen.insert(fp);
                }
            }
            Err(e) => {
                tracing::warn!(task_id = %self.task_id, error = %e, "dedup warm-up failed, starting empty");
            }
        }
    }

    /// Read from the cursor to EOF, buffering a trailing partial line.
    fn read_available(&mut self, path: &Path) {
        let Ok(file) = std::fs::File::open(path) else {
            return;
        };
        let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if file_len < self.cursor {
            // Truncated underneath us; start over. The dedup set makes the
            // re-read harmless.
            tracing::warn!(task_id = %self.task_id, "output file shrank, re-reading from start");
            self.cursor = 0;
            self.partial.clear();
        }
        if file_len == self.cursor {
            return;
        }
        let mut reader = BufReader::new(file);
        if reader.seek(SeekFrom::Start(self.cursor)).is_err() {
            return;
        }

        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if line.ends_with('\n') {
                        self.cursor += n as u64;
                        let complete = if self.partial.is_empty() {
                            line.trim_end_matches('\n').to_string()
                        } else {
                            let mut joined = std::mem::take(&mut self.partial);
                            joined.push_str(line.trim_end_matches('\n'));
                            joined
                        };
                        self.process_line(complete.trim());
                    } else {
                        // No newline yet; re-examine on the next wakeup.
                        self.partial.push_str(&line);
                        self.cursor += n as u64;
                        break;
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.stats.parse_errors += 1;
                tracing::warn!(task_id = %self.task_id, error = %e, "malformed JSONL line skipped");
                return;
            }
        };

        // Scraper stats bridge: a trailing `{"_stats": {...}}` line carries
        // the run's request counter and is not an item.
        if let Some(stats) = value.get("_stats") {
            if let Some(requests) = stats.get("requests").and_then(Value::as_u64) {
                self.stats.requests = requests;
            }
            return;
        }

        let payload = Payload::new(value);
        let fp = fingerprint(&payload);
        if self.is_duplicate(&fp) {
            return;
        }

        let record = ResultRecord {
            id: ResultId::new(self.idgen.next()),
            task_id: self.task_id.clone(),
            url: payload.url().map(String::from),
            crawl_start_ms: payload.crawl_start_ms(),
            item_acquired_ms: payload.item_acquired_ms(),
            payload,
            fingerprint: fp,
        };
        self.pending_bytes += line.len();
        self.batch.push(record);
    }

    /// Per-task dedup with a bounded in-memory set; past the cap the check
    /// degrades to a store query instead of growing without limit.
    fn is_duplicate(&mut self, fp: &str) -> bool {
        if self.seen.contains(fp) {
            return true;
        }
        if self.seen.len() < self.max_dedup_entries {
            self.seen.insert(fp.to_string());
            return false;
        }
        match self.store.fingerprint_exists(&self.task_id, fp) {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(task_id = %self.task_id, error = %e, "store-side dedup check failed, keeping record");
                false
            }
        }
    }

    fn should_flush(&self) -> bool {
        !self.batch.is_empty()
            && (self.batch.len() >= self.batch_max
                || self.last_flush.elapsed() >= self.batch_interval)
    }

    /// Write the batch in one transaction, then publish progress. On store
    /// failure the batch is kept for the next attempt.
    async fn flush(&mut self) -> bool {
        if self.batch.is_empty() {
            self.last_flush = tokio::time::Instant::now();
            return true;
        }
        match self.store.insert_results(&self.batch) {
            Ok(()) => {
                let flushed = self.batch.len() as u64;
                self.stats.ingested += flushed;
                self.total += flushed;
                self.batch.clear();
                self.pending_bytes = 0;
                self.last_flush = tokio::time::Instant::now();

                if let Err(e) = self.store.set_task_items_count(&self.task_id, self.total) {
                    tracing::warn!(task_id = %self.task_id, error = %e, "items_count update failed");
                }
                let now = self.clock.epoch_ms();
                let _ = self
                    .notice_tx
                    .send(Notice::new(
                        EventKind::ResultIngested,
                        self.task_id.clone(),
                        now,
                        serde_json::json!({"count": flushed}),
                    ))
                    .await;
                let _ = self
                    .notice_tx
                    .send(Notice::new(
                        EventKind::TaskProgress,
                        self.task_id.clone(),
                        now,
                        serde_json::json!({"items": self.total}),
                    ))
                    .await;
                true
            }
            Err(e) => {
                tracing::warn!(task_id = %self.task_id, error = %e, pending = self.batch.len(), "result flush failed, will retry");
                false
            }
        }
    }

    /// Drain-time flush: retry briefly so a transient store hiccup does
    /// not lose what the scraper wrote.
    async fn flush_until_empty(&mut self) {
        for _ in 0..3 {
            if self.flush().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if !self.batch.is_empty() {
            tracing::error!(
                task_id = %self.task_id,
                dropped = self.batch.len(),
                "dropping unflushed results after drain retries"
            );
        }
    }

    fn finish(mut self) -> IngestStats {
        self.stats.total = self.total;
        self.stats
    }
}

#[cfg(test)]
#[path = "tailer_tests.rs"]
mod tests;
