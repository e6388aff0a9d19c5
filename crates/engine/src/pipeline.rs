// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effective pipeline configuration for spawned scrapers.
//!
//! The scraper is untrusted to configure its own output: the core
//! materialises a config document at spawn time and passes its path on the
//! command line (`--pipeline-config <path>`). File output is always
//! present; the database pipeline is included only when the project's
//! `persist_results` flag is set.

use indexmap::IndexMap;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use sui_core::{Project, Spider, Task};

/// Build the effective settings document for one task.
///
/// Layering: spider settings first, then the task's override map, then the
/// pipeline section the core owns. The scraper must not be able to drop
/// the file pipeline, so the `pipelines` key is written last.
pub fn effective_config(
    project: &Project,
    spider: &Spider,
    task: &Task,
    output_file: &Path,
    database_url: Option<&str>,
) -> Value {
    let mut settings: IndexMap<String, Value> = IndexMap::new();

    if let Some(Value::Object(map)) = &spider.settings {
        for (k, v) in map {
            settings.insert(k.clone(), v.clone());
        }
    }
    if let Some(Value::Object(map)) = &task.settings_override {
        for (k, v) in map {
            settings.insert(k.clone(), v.clone());
        }
    }

    let mut pipelines = vec![json!({
        "type": "jsonl_file",
        "path": output_file.to_string_lossy(),
        "append": true,
    })];
    if project.persist_results {
        pipelines.push(json!({
            "type": "database",
            "url": database_url,
            "task_id": task.id,
        }));
    }
    settings.insert("pipelines".to_string(), Value::Array(pipelines));

    json!({
        "spider": spider.name,
        "project": project.name,
        "settings": settings,
    })
}

/// Write the config next to the output file as `pipeline_<task_id>.json`.
/// Returns the written path.
pub fn materialize(
    project_dir: &Path,
    project: &Project,
    spider: &Spider,
    task: &Task,
    output_file: &Path,
    database_url: Option<&str>,
) -> std::io::Result<PathBuf> {
    let config = effective_config(project, spider, task, output_file, database_url);
    let path = project_dir.join(format!("pipeline_{}.json", task.id));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(serde_json::to_string_pretty(&config).unwrap_or_default().as_bytes())?;
    Ok(path)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
