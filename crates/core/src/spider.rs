// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spider entity: a named scraper belonging to a project.

use crate::id::{ProjectId, SpiderId};
use serde::{Deserialize, Serialize};

/// A named scraper. `(name, project)` is unique.
///
/// The source blob is stored for the external API's benefit; the core only
/// passes the spider name to the scraper subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spider {
    pub id: SpiderId,
    pub project_id: ProjectId,
    pub name: String,
    pub source: String,
    /// Per-spider settings merged under the task's override map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    /// Framework tag (e.g. "scrapy", "puppeteer"); informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}
