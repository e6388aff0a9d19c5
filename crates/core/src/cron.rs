// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron expression parsing and next-firing computation.
//!
//! Supports `*`, `*/n`, `a`, `a-b`, `a-b/n`, `a/n`, and comma lists in the
//! standard `minute hour day-of-month month day-of-week` order. Evaluation
//! is minute-resolution and performed in an explicit timezone so a firing
//! like `0 9 * * 1` means 09:00 in the configured display zone, not UTC.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors produced while parsing a cron expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid value '{value}' in {field} field")]
    InvalidValue { field: &'static str, value: String },
    #[error("value {value} out of range {min}-{max} in {field} field")]
    OutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
    #[error("inverted range {0}-{1}")]
    InvertedRange(u8, u8),
    #[error("step must be non-zero")]
    ZeroStep,
}

const FIELDS: [(&str, u8, u8); 5] = [
    ("minute", 0, 59),
    ("hour", 0, 23),
    ("day-of-month", 1, 31),
    ("month", 1, 12),
    ("day-of-week", 0, 6),
];

/// How far ahead `next_after` searches before giving up. Four years covers
/// the rarest satisfiable expression (Feb 29).
const MAX_SEARCH_DAYS: i64 = 4 * 366;

/// A parsed 5-field cron expression.
///
/// Per POSIX, when both day-of-month and day-of-week are restricted the
/// day matches if *either* field matches; when only one is restricted that
/// field alone decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
    source: String,
}

impl CronExpr {
    /// Parse a 5-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut sets = [0u64; 5];
        let mut restricted = [false; 5];
        for (i, part) in parts.iter().enumerate() {
            let (name, min, max) = FIELDS[i];
            let (set, r) = parse_field(part, name, min, max)?;
            sets[i] = set;
            restricted[i] = r;
        }

        Ok(Self {
            minutes: sets[0],
            hours: sets[1] as u32,
            days_of_month: sets[2] as u32,
            months: sets[3] as u16,
            days_of_week: sets[4] as u8,
            dom_restricted: restricted[2],
            dow_restricted: restricted[4],
            source: expr.trim().to_string(),
        })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn minute_matches(&self, minute: u32) -> bool {
        self.minutes & (1u64 << minute) != 0
    }

    fn hour_matches(&self, hour: u32) -> bool {
        self.hours & (1u32 << hour) != 0
    }

    fn day_matches<T: TimeZone>(&self, t: &DateTime<T>) -> bool {
        if self.months & (1u16 << t.month()) == 0 {
            return false;
        }
        let dom = self.days_of_month & (1u32 << t.day()) != 0;
        let dow = self.days_of_week & (1u8 << t.weekday().num_days_from_sunday()) != 0;
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Compute the first firing instant strictly after `after`.
    ///
    /// Walks forward at day granularity until the date matches, then scans
    /// hours and minutes. Returns `None` only for expressions that cannot
    /// fire within [`MAX_SEARCH_DAYS`] (e.g. `0 0 31 2 *`).
    pub fn next_after(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut t = truncate_to_minute(&after)? + Duration::minutes(1);
        let deadline = after.clone() + Duration::days(MAX_SEARCH_DAYS);

        while t <= deadline {
            if !self.day_matches(&t) {
                // Skip to the next local midnight.
                t = next_midnight(&t)?;
                continue;
            }
            if !self.hour_matches(t.hour()) {
                // Skip to the top of the next hour.
                t = truncate_to_hour(&t)? + Duration::hours(1);
                continue;
            }
            if !self.minute_matches(t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Parse one cron field into a bitmask. Returns `(mask, restricted)` where
/// `restricted` is false only for a bare `*`.
fn parse_field(part: &str, field: &'static str, min: u8, max: u8) -> Result<(u64, bool), CronError> {
    let mut mask = 0u64;
    let mut restricted = true;

    for term in part.split(',') {
        let (range, step) = match term.split_once('/') {
            Some((r, s)) => {
                let step: u8 = s.parse().map_err(|_| CronError::InvalidValue {
                    field,
                    value: term.to_string(),
                })?;
                if step == 0 {
                    return Err(CronError::ZeroStep);
                }
                (r, step)
            }
            None => (term, 1),
        };

        let (lo, hi) = if range == "*" {
            if term == "*" && part == "*" {
                restricted = false;
            }
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let lo = parse_value(a, field, min, max)?;
            let hi = parse_value(b, field, min, max)?;
            if lo > hi {
                return Err(CronError::InvertedRange(lo, hi));
            }
            (lo, hi)
        } else {
            let v = parse_value(range, field, min, max)?;
            // `a/n` means "from a to max, every n"; bare `a` is just a.
            if term.contains('/') {
                (v, max)
            } else {
                (v, v)
            }
        };

        let mut v = lo;
        while v <= hi {
            let bit = normalize(field, v);
            mask |= 1u64 << bit;
            v = match v.checked_add(step) {
                Some(n) => n,
                None => break,
            };
        }
    }

    Ok((mask, restricted))
}

fn parse_value(s: &str, field: &'static str, min: u8, max: u8) -> Result<u8, CronError> {
    let v: u8 = s.parse().map_err(|_| CronError::InvalidValue {
        field,
        value: s.to_string(),
    })?;
    // Day-of-week 7 is an alias for Sunday.
    if field == "day-of-week" && v == 7 {
        return Ok(7);
    }
    if v < min || v > max {
        return Err(CronError::OutOfRange {
            field,
            value: v,
            min,
            max,
        });
    }
    Ok(v)
}

fn normalize(field: &'static str, v: u8) -> u8 {
    if field == "day-of-week" && v == 7 {
        0
    } else {
        v
    }
}

fn truncate_to_minute(t: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    t.with_second(0)?.with_nanosecond(0)
}

fn truncate_to_hour(t: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    truncate_to_minute(t)?.with_minute(0)
}

/// The first minute of the next local day. Computed via date arithmetic so
/// DST transitions cannot produce a skipped or repeated midnight scan.
fn next_midnight(t: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let next_day = t.date_naive().succ_opt()?;
    match t
        .timezone()
        .from_local_datetime(&next_day.and_hms_opt(0, 0, 0)?)
    {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => Some(dt),
        // Midnight skipped by a DST gap; fall forward one hour.
        chrono::LocalResult::None => match t
            .timezone()
            .from_local_datetime(&next_day.and_hms_opt(1, 0, 0)?)
        {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => Some(dt),
            chrono::LocalResult::None => None,
        },
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
