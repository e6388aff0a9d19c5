// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprints for per-task deduplication.

use sha2::{Digest, Sha256};
use sui_core::Payload;

/// SHA-256 over the payload's canonical bytes, as 64 lowercase hex chars.
///
/// Identical scraped content always hashes identically regardless of key
/// order or volatile per-item timestamps; collisions are treated as
/// duplicates.
pub fn fingerprint(payload: &Payload) -> String {
    let digest = Sha256::digest(payload.canonical_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
