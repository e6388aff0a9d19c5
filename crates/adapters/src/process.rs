// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scraper subprocess spawning and supervision.
//!
//! The contract with the scraper is narrow: argv carries the spider name,
//! the working directory is the project path, stdin is closed, and the
//! environment carries `TASK_ID`, `OUTPUT_FILE`, `CRAWL_START`, and
//! optionally `DATABASE_URL`. Stdout/stderr are streamed line-by-line into
//! bounded ring buffers so a terminal failure can report the tail without
//! holding the whole output in memory.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Bytes of stderr (and stdout) tail retained for error reporting.
const TAIL_CAPACITY_BYTES: usize = 16 * 1024;

/// Errors that can occur while spawning or supervising a scraper.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("executable not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("spawn timed out after {0:?}")]
    Timeout(Duration),
    #[error("spawn failed: {0}")]
    Io(String),
}

/// What to spawn and with which contract values.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Scraper executable (e.g. the configured runner command).
    pub command: String,
    /// Arguments; the spider name comes first.
    pub args: Vec<String>,
    /// Project directory the scraper runs in.
    pub cwd: PathBuf,
    /// Contract environment (`TASK_ID`, `OUTPUT_FILE`, ...).
    pub env: Vec<(String, String)>,
}

/// Bounded line buffer keeping only the newest bytes.
#[derive(Default)]
struct TailBuffer {
    lines: VecDeque<String>,
    bytes: usize,
}

impl TailBuffer {
    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > TAIL_CAPACITY_BYTES {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            } else {
                break;
            }
        }
    }

    fn render(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A supervised scraper subprocess.
pub struct ScraperProcess {
    child: Child,
    pid: Option<u32>,
    stderr_tail: Arc<Mutex<TailBuffer>>,
    wrote_stdout: Arc<AtomicBool>,
}

impl ScraperProcess {
    /// Spawn the scraper described by `spec`.
    ///
    /// `spawn_timeout` bounds the time until the child is confirmed
    /// started (spawn syscall plus an immediate-exit probe).
    pub async fn spawn(spec: SpawnSpec, spawn_timeout: Duration) -> Result<Self, SpawnError> {
        let spawned = tokio::time::timeout(spawn_timeout, Self::spawn_inner(spec)).await;
        match spawned {
            Ok(result) => result,
            Err(_) => Err(SpawnError::Timeout(spawn_timeout)),
        }
    }

    async fn spawn_inner(spec: SpawnSpec) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SpawnError::NotFound(spec.command.clone()),
            std::io::ErrorKind::PermissionDenied => {
                SpawnError::PermissionDenied(spec.command.clone())
            }
            _ => SpawnError::Io(e.to_string()),
        })?;

        let pid = child.id();
        let stderr_tail = Arc::new(Mutex::new(TailBuffer::default()));
        let wrote_stdout = Arc::new(AtomicBool::new(false));

        if let Some(stdout) = child.stdout.take() {
            let wrote = Arc::clone(&wrote_stdout);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    wrote.store(true, Ordering::Relaxed);
                    tracing::trace!(target: "scraper", "{line}");
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(target: "scraper", "{line}");
                    tail.lock().push(line);
                }
            });
        }

        Ok(Self {
            child,
            pid,
            stderr_tail,
            wrote_stdout,
        })
    }

    /// OS process id, when the child is still attached.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the scraper to stop (SIGTERM). Safe to call more than once.
    pub fn terminate(&self) {
        if let Some(pid) = self.pid {
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!(pid, error = %e, "SIGTERM delivery failed");
            }
        }
    }

    /// Force-kill the scraper (SIGKILL).
    pub fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "SIGKILL delivery failed");
        }
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Whether the scraper produced anything on stdout.
    pub fn wrote_stdout(&self) -> bool {
        self.wrote_stdout.load(Ordering::Relaxed)
    }

    /// The captured tail of stderr, newline-joined.
    pub fn stderr_tail(&self) -> String {
        self.stderr_tail.lock().render()
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
