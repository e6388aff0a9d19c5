// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spider queries.

use crate::{Store, StoreError};
use rusqlite::{params, Row};
use sui_core::{ProjectId, Spider, SpiderId};

fn row_to_spider(row: &Row<'_>) -> Result<Spider, rusqlite::Error> {
    let settings: Option<String> = row.get(4)?;
    Ok(Spider {
        id: SpiderId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        source: row.get(3)?,
        settings: settings.and_then(|s| serde_json::from_str(&s).ok()),
        framework: row.get(5)?,
    })
}

const SPIDER_COLS: &str = "id, project_id, name, source, settings, framework";

impl Store {
    pub fn insert_spider(&self, spider: &Spider) -> Result<(), StoreError> {
        let settings = spider
            .settings
            .as_ref()
            .map(|s| s.to_string());
        self.with_retry("insert_spider", |conn| {
            conn.execute(
                "INSERT INTO spiders (id, project_id, name, source, settings, framework)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    spider.id.as_str(),
                    spider.project_id.as_str(),
                    spider.name,
                    spider.source,
                    settings,
                    spider.framework,
                ],
            )
            .map(|_| ())
        })
    }

    pub fn spider(&self, id: &SpiderId) -> Result<Spider, StoreError> {
        self.with_retry("spider", |conn| {
            conn.query_row(
                &format!("SELECT {SPIDER_COLS} FROM spiders WHERE id = ?1"),
                params![id.as_str()],
                row_to_spider,
            )
        })
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(format!("spider {id}")),
            other => other,
        })
    }

    /// Delete a spider. Schedules cascade; historical tasks and results
    /// are kept.
    pub fn delete_spider(&self, id: &SpiderId) -> Result<(), StoreError> {
        self.with_retry("delete_spider", |conn| {
            conn.execute("DELETE FROM spiders WHERE id = ?1", params![id.as_str()])
                .map(|_| ())
        })
    }
}
