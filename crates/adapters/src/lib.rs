// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sui-adapters: side-effecting adapters for the execution core.
//!
//! Everything that touches the outside world — scraper subprocesses and
//! filesystem change notifications — lives here so the engine stays
//! testable against fakes.

pub mod fswatch;
pub mod process;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use fswatch::FileWatch;
pub use process::{ScraperProcess, SpawnError, SpawnSpec};
