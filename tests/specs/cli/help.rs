// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box checks of the suid binary's argument surface.

use assert_cmd::Command;

#[test]
fn help_prints_usage_and_exits_zero() {
    Command::new(crate::prelude::suid_bin())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("USAGE:"))
        .stdout(predicates::str::contains("check-config"))
        .stdout(predicates::str::contains("reconcile-once"));
}

#[test]
fn version_prints_and_exits_zero() {
    Command::new(crate::prelude::suid_bin())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("suid "));
}

#[test]
fn unknown_argument_is_a_config_error() {
    Command::new(crate::prelude::suid_bin())
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("unexpected argument"));
}
