// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: defaults ← optional TOML file ← environment.
//!
//! `suid check-config` runs [`Config::validate`], which parses the
//! timezone, checks numeric sanity, opens the store, and parses every
//! active schedule's cron expression.

use crate::env;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sui_core::CronExpr;
use sui_engine::EngineConfig;
use sui_storage::Store;
use thiserror::Error;

/// Configuration failures. All of them are fatal at boot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no usable data directory (set SCRAPY_UI_DATA_DIR or HOME)")]
    NoDataDir,
    #[error("cannot read config file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
    #[error("config file parse error: {0}")]
    Parse(String),
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("store unreachable: {0}")]
    StoreUnreachable(String),
    #[error("schedule {id} has invalid cron '{cron}': {message}")]
    InvalidScheduleCron {
        id: String,
        cron: String,
        message: String,
    },
}

/// On-disk TOML shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    timezone: Option<String>,
    db_url: Option<String>,
    projects_root: Option<PathBuf>,
    scraper_command: Option<String>,
    scraper_args: Option<Vec<String>>,
    max_concurrent_tasks: Option<usize>,
    per_project_limit: Option<usize>,
    queue_capacity: Option<usize>,
    task_timeout_s: Option<u64>,
    reconcile_interval_s: Option<u64>,
    stuck_timeout_s: Option<u64>,
    retention_interval_s: Option<u64>,
    max_jsonl_lines: Option<usize>,
    keep_sessions: Option<usize>,
    gateway_addr: Option<String>,
    log_path: Option<PathBuf>,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// URL advertised to scrapers via `DATABASE_URL`.
    pub db_url: String,
    pub gateway_addr: Option<String>,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
}

impl Config {
    /// Load from the default locations, applying env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match env::config_path() {
            Some(path) => read_file(&path)?,
            None => FileConfig::default(),
        };
        Self::from_parts(file)
    }

    fn from_parts(file: FileConfig) -> Result<Self, ConfigError> {
        let data_dir = env::data_dir().ok_or(ConfigError::NoDataDir)?;

        let mut engine = EngineConfig::default();

        let tz_name = env::timezone().or(file.timezone);
        if let Some(name) = tz_name {
            engine.timezone = name
                .parse()
                .map_err(|_| ConfigError::InvalidTimezone(name))?;
        }
        if let Some(root) = file.projects_root {
            engine.projects_root = root;
        }
        if engine.projects_root.is_relative() {
            engine.projects_root = data_dir.join(&engine.projects_root);
        }
        if let Some(cmd) = file.scraper_command {
            engine.scraper_command = cmd;
        }
        if let Some(args) = file.scraper_args {
            engine.scraper_args = args;
        }
        if let Some(n) = env::max_concurrent_tasks().or(file.max_concurrent_tasks) {
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "max_concurrent_tasks",
                    message: "must be at least 1".to_string(),
                });
            }
            engine.max_concurrent_tasks = n;
        }
        if let Some(n) = file.per_project_limit {
            engine.per_project_limit = Some(n.max(1));
        }
        if let Some(n) = file.queue_capacity {
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "queue_capacity",
                    message: "must be at least 1".to_string(),
                });
            }
            engine.queue_capacity = n;
        }
        if let Some(s) = file.task_timeout_s {
            engine.task_timeout = Duration::from_secs(s);
        }
        if let Some(s) = env::reconcile_interval_s().or(file.reconcile_interval_s) {
            if s == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "reconcile_interval_s",
                    message: "must be at least 1".to_string(),
                });
            }
            engine.reconcile_interval = Duration::from_secs(s);
        }
        if let Some(s) = file.stuck_timeout_s {
            engine.stuck_timeout = Duration::from_secs(s);
        }
        if let Some(s) = file.retention_interval_s {
            engine.retention_interval = Duration::from_secs(s);
        }
        if let Some(n) = file.max_jsonl_lines {
            engine.max_jsonl_lines = n;
        }
        if let Some(n) = file.keep_sessions {
            engine.keep_sessions = n.max(1);
        }

        let db_url = env::db_url()
            .or(file.db_url)
            .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("scrapy-ui.db").display()));
        let db_path = parse_db_path(&db_url)?;
        engine.database_url = Some(db_url.clone());

        let gateway_addr = env::gateway_addr().or(file.gateway_addr);
        let log_path = env::log_path()
            .or(file.log_path)
            .unwrap_or_else(|| data_dir.join("daemon.log"));

        Ok(Self {
            engine,
            lock_path: data_dir.join("daemon.lock"),
            db_path,
            db_url,
            gateway_addr,
            log_path,
            data_dir,
        })
    }

    /// Validate everything `serve` needs, including store reachability
    /// and the cron expressions of active schedules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = Store::open(&self.db_path)
            .map_err(|e| ConfigError::StoreUnreachable(e.to_string()))?;
        let schedules = store
            .active_schedules()
            .map_err(|e| ConfigError::StoreUnreachable(e.to_string()))?;
        for schedule in schedules {
            if let Err(e) = CronExpr::parse(&schedule.cron_expr) {
                return Err(ConfigError::InvalidScheduleCron {
                    id: schedule.id.to_string(),
                    cron: schedule.cron_expr,
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn read_file(path: &std::path::Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Accepts `sqlite:///abs/path`, `sqlite://rel/path`, or a bare path.
fn parse_db_path(url: &str) -> Result<PathBuf, ConfigError> {
    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if path.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "db_url",
            message: format!("no path in '{url}'"),
        });
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
