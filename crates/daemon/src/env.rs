// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Optional path to the TOML config file.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("SCRAPY_UI_CONFIG").ok().map(PathBuf::from)
}

/// Resolve data directory: SCRAPY_UI_DATA_DIR > XDG_STATE_HOME/scrapy-ui
/// > ~/.local/state/scrapy-ui
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("SCRAPY_UI_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("scrapy-ui"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/scrapy-ui"))
}

/// Display/cron timezone override.
pub fn timezone() -> Option<String> {
    std::env::var("SCRAPY_UI_TIMEZONE").ok()
}

/// Database URL override (`sqlite:///abs/path` or a bare path).
pub fn db_url() -> Option<String> {
    std::env::var("SCRAPY_UI_DB_URL").ok()
}

/// Worker pool size override.
pub fn max_concurrent_tasks() -> Option<usize> {
    std::env::var("SCRAPY_UI_MAX_CONCURRENT_TASKS")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Reconcile interval override, seconds.
pub fn reconcile_interval_s() -> Option<u64> {
    std::env::var("SCRAPY_UI_RECONCILE_INTERVAL_S")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// WebSocket gateway bind address override.
pub fn gateway_addr() -> Option<String> {
    std::env::var("SCRAPY_UI_GATEWAY_ADDR").ok()
}

/// Daemon log file override.
pub fn log_path() -> Option<PathBuf> {
    std::env::var("SCRAPY_UI_LOG_PATH").ok().map(PathBuf::from)
}
