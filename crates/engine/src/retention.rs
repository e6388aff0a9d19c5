// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output-file retention: session-based trimming and backup cleanup.
//!
//! A session is a run of contiguous lines sharing the same
//! `crawl_start_datetime` value. Oversized files are rewritten atomically
//! keeping only the most recent sessions, with the original preserved
//! under a `.backup_<iso-instant>` suffix. Files owned by a live tailer
//! are never touched.

use crate::config::EngineConfig;
use crate::dispatcher::ActiveTasks;
use chrono::{DateTime, Utc};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sui_core::{Clock, Payload, TaskId};

/// What one retention pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub files_trimmed: u64,
    pub lines_removed: u64,
    pub backups_deleted: u64,
}

pub struct Retention<C: Clock> {
    clock: C,
    config: Arc<EngineConfig>,
    active: ActiveTasks,
}

impl<C: Clock> Retention<C> {
    pub fn new(clock: C, config: Arc<EngineConfig>, active: ActiveTasks) -> Self {
        Self {
            clock,
            config,
            active,
        }
    }

    /// Run passes on the configured interval until shutdown.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.retention_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_once();
                    if report != RetentionReport::default() {
                        tracing::info!(?report, "retention pass complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("retention stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Walk every project directory under the configured root once.
    pub fn run_once(&self) -> RetentionReport {
        let mut report = RetentionReport::default();
        let root = &self.config.projects_root;
        let Ok(projects) = std::fs::read_dir(root) else {
            return report;
        };
        for project in projects.filter_map(|e| e.ok()) {
            if !project.path().is_dir() {
                continue;
            }
            self.sweep_dir(&project.path(), &mut report);
        }
        report
    }

    /// Trim oversized output files and delete expired backups in one
    /// project directory.
    pub fn sweep_dir(&self, dir: &Path, report: &mut RetentionReport) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let now_ms = self.clock.epoch_ms();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.contains(".backup_") {
                if self.backup_expired(&path, name, now_ms) && std::fs::remove_file(&path).is_ok() {
                    report.backups_deleted += 1;
                    tracing::debug!(path = %path.display(), "expired backup deleted");
                }
                continue;
            }

            if !name.starts_with("results_") || !name.ends_with(".jsonl") {
                continue;
            }
            // Live tailers own their file; leave it alone.
            let task_id = TaskId::new(
                name.trim_start_matches("results_")
                    .trim_end_matches(".jsonl"),
            );
            if self.active.contains(&task_id) {
                continue;
            }

            match trim_file(
                &path,
                self.config.max_jsonl_lines,
                self.config.keep_sessions,
                now_ms,
            ) {
                Ok(Some(removed)) => {
                    report.files_trimmed += 1;
                    report.lines_removed += removed;
                    tracing::info!(path = %path.display(), removed, "output file trimmed");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "trim failed");
                }
            }
        }
    }

    /// Age check: prefer the timestamp baked into the suffix, fall back to
    /// the filesystem mtime.
    fn backup_expired(&self, path: &Path, name: &str, now_ms: u64) -> bool {
        let max_age_ms = self.config.max_backup_age.as_millis() as u64;
        if let Some(stamp) = name.split(".backup_").nth(1) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(stamp) {
                let age = now_ms.saturating_sub(parsed.timestamp_millis().max(0) as u64);
                return age > max_age_ms;
            }
        }
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        let modified_ms = modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(u64::MAX);
        now_ms.saturating_sub(modified_ms) > max_age_ms
    }
}

/// Rewrite `path` keeping only the newest `keep_sessions` sessions when
/// the file exceeds `max_lines`. Returns `Ok(Some(removed))` when a trim
/// happened. The original is copied to `<name>.backup_<iso>` first and the
/// replacement lands via tmp-file + atomic rename.
fn trim_file(
    path: &Path,
    max_lines: usize,
    keep_sessions: usize,
    now_ms: u64,
) -> std::io::Result<Option<u64>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= max_lines {
        return Ok(None);
    }

    // Contiguous runs sharing a crawl_start_datetime value. Lines without
    // the key (or unparseable ones) stick to the current session.
    let mut sessions: Vec<(Option<String>, Vec<&String>)> = Vec::new();
    for line in &lines {
        let key = session_key(line);
        match sessions.last_mut() {
            Some((current, members)) if key.is_none() || key == *current => {
                members.push(line);
            }
            _ => sessions.push((key, vec![line])),
        }
    }

    let keep_from = sessions.len().saturating_sub(keep_sessions.max(1));
    let kept: Vec<&String> = sessions[keep_from..]
        .iter()
        .flat_map(|(_, members)| members.iter().copied())
        .collect();
    let removed = (lines.len() - kept.len()) as u64;
    if removed == 0 {
        return Ok(None);
    }

    let stamp = DateTime::<Utc>::from_timestamp_millis(now_ms as i64)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let backup = backup_path(path, &stamp);
    std::fs::copy(path, &backup)?;

    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = std::fs::File::create(&tmp)?;
        for line in &kept {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    Ok(Some(removed))
}

fn session_key(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    Payload::new(value).crawl_start_raw().map(String::from)
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.backup_{stamp}"))
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
