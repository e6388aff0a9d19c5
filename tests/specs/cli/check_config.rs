// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box checks of `suid check-config` and `suid reconcile-once`.

use assert_cmd::Command;

fn suid_in(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(crate::prelude::suid_bin());
    cmd.env_clear()
        .env("HOME", dir)
        .env("SCRAPY_UI_DATA_DIR", dir);
    cmd
}

#[test]
fn check_config_passes_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    suid_in(dir.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicates::str::contains("configuration ok"))
        .stdout(predicates::str::contains("Asia/Tokyo"));
}

#[test]
fn check_config_rejects_bad_timezone() {
    let dir = tempfile::tempdir().unwrap();
    suid_in(dir.path())
        .env("SCRAPY_UI_TIMEZONE", "Nowhere/Invalid")
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("unknown timezone"));
}

#[test]
fn check_config_rejects_zero_workers() {
    let dir = tempfile::tempdir().unwrap();
    suid_in(dir.path())
        .env("SCRAPY_UI_MAX_CONCURRENT_TASKS", "0")
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("max_concurrent_tasks"));
}

#[test]
fn check_config_honours_env_overrides() {
    let dir = tempfile::tempdir().unwrap();
    suid_in(dir.path())
        .env("SCRAPY_UI_TIMEZONE", "UTC")
        .env("SCRAPY_UI_MAX_CONCURRENT_TASKS", "7")
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicates::str::contains("UTC"))
        .stdout(predicates::str::contains("7"));
}

#[test]
fn reconcile_once_reports_on_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    suid_in(dir.path())
        .arg("reconcile-once")
        .assert()
        .success()
        .stdout(predicates::str::contains("reconciled:"))
        .stdout(predicates::str::contains("0 stuck failed"));
}
