// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scrapy UI daemon (suid)
//!
//! Control surface:
//! - `suid serve`          start all components
//! - `suid check-config`   validate configuration and exit
//! - `suid reconcile-once` run one reconciliation pass and exit
//!
//! Exit codes: 0 success, 1 configuration error, 2 runtime fatal,
//! 130 on SIGINT.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::process::ExitCode;
use std::sync::Arc;
use sui_core::SystemClock;
use sui_daemon::{lifecycle, Config};
use sui_engine::Reconciler;
use tokio::signal::unix::{signal, SignalKind};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG: u8 = 1;
const EXIT_RUNTIME: u8 = 2;
const EXIT_SIGINT: u8 = 130;

fn main() -> ExitCode {
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(code) => return ExitCode::from(code),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {e}");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    let code = match command {
        Command::Serve => runtime.block_on(serve()),
        Command::CheckConfig => check_config(),
        Command::ReconcileOnce => runtime.block_on(reconcile_once()),
    };
    ExitCode::from(code)
}

enum Command {
    Serve,
    CheckConfig,
    ReconcileOnce,
}

fn parse_args() -> Result<Command, u8> {
    let arg = std::env::args().nth(1);
    match arg.as_deref() {
        Some("serve") | None => Ok(Command::Serve),
        Some("check-config") => Ok(Command::CheckConfig),
        Some("reconcile-once") => Ok(Command::ReconcileOnce),
        Some("--version") | Some("-V") | Some("-v") => {
            println!("suid {}", env!("CARGO_PKG_VERSION"));
            Err(EXIT_OK)
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
            Err(EXIT_OK)
        }
        Some(other) => {
            eprintln!("error: unexpected argument '{other}'");
            eprintln!("Usage: suid [serve | check-config | reconcile-once]");
            Err(EXIT_CONFIG)
        }
    }
}

fn print_help() {
    println!("suid {}", env!("CARGO_PKG_VERSION"));
    println!("Scrapy UI daemon - runs the scraping execution core");
    println!();
    println!("USAGE:");
    println!("    suid [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    serve             Start all components (default)");
    println!("    check-config      Validate configuration and exit");
    println!("    reconcile-once    Run one reconciliation pass and exit");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    SCRAPY_UI_TIMEZONE, SCRAPY_UI_DB_URL, SCRAPY_UI_DATA_DIR,");
    println!("    SCRAPY_UI_MAX_CONCURRENT_TASKS, SCRAPY_UI_RECONCILE_INTERVAL_S,");
    println!("    SCRAPY_UI_GATEWAY_ADDR, SCRAPY_UI_CONFIG, SCRAPY_UI_LOG_PATH");
}

async fn serve() -> u8 {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_CONFIG;
        }
    };

    rotate_log_if_needed(&config.log_path);
    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: logging setup failed: {e}");
            return EXIT_CONFIG;
        }
    };

    tracing::info!("starting suid");

    let core = match lifecycle::startup(&config).await {
        Ok(core) => core,
        Err(lifecycle::LifecycleError::LockFailed(path)) => {
            eprintln!("suid is already running (lock: {path})");
            return EXIT_CONFIG;
        }
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("error: {e}");
            return EXIT_RUNTIME;
        }
    };

    // Signal ready for whoever launched us.
    println!("READY");

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "signal handler setup failed");
            return EXIT_RUNTIME;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "signal handler setup failed");
            return EXIT_RUNTIME;
        }
    };

    let code = tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
            EXIT_OK
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, shutting down");
            EXIT_SIGINT
        }
    };

    core.shutdown();
    // Give the loops a moment to observe the flag before the runtime drops.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    tracing::info!("daemon stopped");
    code
}

fn check_config() -> u8 {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return EXIT_CONFIG;
        }
    };
    match config.validate() {
        Ok(()) => {
            println!("configuration ok");
            println!("  data dir:      {}", config.data_dir.display());
            println!("  database:      {}", config.db_path.display());
            println!("  projects root: {}", config.engine.projects_root.display());
            println!("  timezone:      {}", config.engine.timezone);
            println!("  workers:       {}", config.engine.max_concurrent_tasks);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("config error: {e}");
            EXIT_CONFIG
        }
    }
}

async fn reconcile_once() -> u8 {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return EXIT_CONFIG;
        }
    };
    setup_stderr_logging();

    let store = match sui_storage::Store::open(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: store unreachable: {e}");
            return EXIT_RUNTIME;
        }
    };

    let (notice_tx, mut notice_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move { while notice_rx.recv().await.is_some() {} });

    let reconciler = Reconciler::new(
        store,
        SystemClock,
        Arc::new(config.engine.clone()),
        sui_engine::ActiveTasks::default(),
        notice_tx,
    );
    let report = reconciler.run_once().await;
    println!(
        "reconciled: {} stuck failed, {} repaired finished, {} duplicates removed, {} counts fixed",
        report.stuck_failed,
        report.repaired_finished,
        report.duplicates_removed,
        report.counts_fixed
    );
    EXIT_OK
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config
        .log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent directory"))?;
    std::fs::create_dir_all(parent)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

fn setup_stderr_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
