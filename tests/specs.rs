// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for the execution core.
//!
//! The cli/ specs are black-box: they invoke the suid binary and verify
//! stdout, stderr, and exit codes. The core/ specs drive the assembled
//! components through their public APIs against a temp store and
//! scripted scrapers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/check_config.rs"]
mod cli_check_config;
#[path = "specs/cli/help.rs"]
mod cli_help;

// core/
#[path = "specs/core/cancellation.rs"]
mod core_cancellation;
#[path = "specs/core/cron_at_most_once.rs"]
mod core_cron_at_most_once;
#[path = "specs/core/duplicates.rs"]
mod core_duplicates;
#[path = "specs/core/exit_code_repair.rs"]
mod core_exit_code_repair;
#[path = "specs/core/retention.rs"]
mod core_retention;
#[path = "specs/core/single_shot.rs"]
mod core_single_shot;
