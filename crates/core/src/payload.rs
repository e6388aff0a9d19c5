// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scraped item payload: an opaque JSON value with three reserved keys.
//!
//! Everything the scraper emits is persisted as-is; the core only
//! interprets `crawl_start_datetime`, `item_acquired_datetime`, and `url`.
//! The canonical byte form feeds the content fingerprint and therefore
//! excludes the per-item timestamps the pipeline injects, so a re-scrape of
//! identical content hashes identically.

use crate::clock::parse_iso_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key carrying the crawl session start instant.
pub const CRAWL_START_KEY: &str = "crawl_start_datetime";
/// Key carrying the per-item acquisition instant.
pub const ITEM_ACQUIRED_KEY: &str = "item_acquired_datetime";
/// Key carrying the source URL.
pub const URL_KEY: &str = "url";

/// Fields excluded from the canonical form. These vary per emission even
/// when the scraped content is identical.
const VOLATILE_KEYS: [&str; 2] = ["scraped_at", ITEM_ACQUIRED_KEY];

/// One scraped record's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// Wrap a parsed JSON value. Non-object values are accepted; the
    /// reserved-key accessors simply return `None` for them.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Crawl session start, as epoch milliseconds.
    pub fn crawl_start_ms(&self) -> Option<u64> {
        self.get_str(CRAWL_START_KEY).and_then(parse_iso_ms)
    }

    /// The raw crawl session start string, used as the session delimiter
    /// by retention trimming.
    pub fn crawl_start_raw(&self) -> Option<&str> {
        self.get_str(CRAWL_START_KEY)
    }

    /// Item acquisition instant, as epoch milliseconds.
    pub fn item_acquired_ms(&self) -> Option<u64> {
        self.get_str(ITEM_ACQUIRED_KEY).and_then(parse_iso_ms)
    }

    /// Source URL, if the scraper provided one.
    pub fn url(&self) -> Option<&str> {
        self.get_str(URL_KEY)
    }

    /// Canonical serialisation: object keys sorted at every nesting level,
    /// UTF-8, volatile fields removed. Sorting is done explicitly rather
    /// than relying on the map order of the JSON parser.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_canonical(&self.0, true, &mut out);
        out
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Append the canonical form of `v`. `top_level` controls whether the
/// volatile-key filter applies (only the root object carries them).
fn write_canonical(v: &Value, top_level: bool, out: &mut Vec<u8>) {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !top_level || !VOLATILE_KEYS.contains(&k.as_str()))
                .collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(
                    serde_json::to_vec(key).unwrap_or_default().as_slice(),
                );
                out.push(b':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, false, out);
                }
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, false, out);
            }
            out.push(b']');
        }
        scalar => {
            out.extend_from_slice(serde_json::to_vec(scalar).unwrap_or_default().as_slice());
        }
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
