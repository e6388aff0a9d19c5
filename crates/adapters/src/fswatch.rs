// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-change notifications with graceful poll-only degradation.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// OS-level change notifications for a single file.
///
/// When the platform watcher can't be created the watch degrades
/// silently: `changed()` never resolves and callers fall back to their
/// poll interval, which they need anyway for missed events.
pub struct FileWatch {
    _watcher: Option<RecommendedWatcher>,
    rx: mpsc::Receiver<()>,
}

impl FileWatch {
    /// Start watching `path`. The file must already exist.
    pub fn start(path: &Path) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let watcher = match create_watcher(path, tx) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "file watcher failed, using fallback polling");
                None
            }
        };
        Self {
            _watcher: watcher,
            rx,
        }
    }

    /// Whether OS-level events are active (false means poll-only).
    pub fn is_active(&self) -> bool {
        self._watcher.is_some()
    }

    /// Wait for the next change notification. Pends forever in poll-only
    /// mode, so always race this against a poll timer.
    pub async fn changed(&mut self) {
        if self._watcher.is_none() {
            std::future::pending::<()>().await;
        }
        let _ = self.rx.recv().await;
    }
}

fn create_watcher(
    path: &Path,
    tx: mpsc::Sender<()>,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if res.is_ok() {
            let _ = tx.blocking_send(());
        }
    })?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
#[path = "fswatch_tests.rs"]
mod tests;
