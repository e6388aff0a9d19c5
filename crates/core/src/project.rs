// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project entity: a logical grouping of spiders with an on-disk directory.

use crate::id::{OwnerId, ProjectId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A scraping project.
///
/// `(name, owner)` and `path` are unique across the store. The path is
/// relative to the configured projects root; the dispatcher resolves it to
/// an absolute working directory at spawn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub path: PathBuf,
    pub owner: OwnerId,
    /// When true, spawned scrapers get the database pipeline in addition
    /// to file output.
    pub persist_results: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}
