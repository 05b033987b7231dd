//! Calendar-date parsing in the agency's local time zone.
//!
//! Every date the catalog compares is first reduced to a local calendar day
//! (midnight truncation), so a departure stored as `2025-06-05T21:30:00Z` and
//! a filter bound of `2025-06-06` compare the way a visitor in Kyiv expects.
//!
//! # Accepted Formats
//!
//! - **RFC3339**: `"2025-06-05T21:30:00Z"` (converted to the local zone first)
//! - **Naive date-time**: `"2025-06-05T10:00:00"`, `"2025-06-05T10:00:00.000"` (already local)
//! - **ISO dates**: `"2025-06-05"`
//!
//! Anything else, including blank input, yields `None`. Callers drop such
//! values instead of failing the request.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::errors::*;

pub const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";

/// Parse a date string into the local calendar day it falls on.
pub fn parse_calendar_date(input: &str, tz: Tz) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    // Offset-aware timestamps are moved into the local zone before truncating
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&tz).date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| Error::Context(format!("Unknown timezone {}: {}", name, e)))
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant, for deterministic date boundaries.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The local zone plus a clock. Shared as app data by every handler that
/// needs "today" or has to interpret a date string.
#[derive(Clone)]
pub struct LocalCalendar {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl LocalCalendar {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    pub fn system(tz: Tz) -> Self {
        Self::new(tz, Arc::new(SystemClock))
    }

    pub fn fixed(tz: Tz, now: DateTime<Utc>) -> Self {
        Self::new(tz, Arc::new(FixedClock(now)))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's local date, i.e. the current instant truncated to local midnight.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.tz).date_naive()
    }

    pub fn parse(&self, input: &str) -> Option<NaiveDate> {
        parse_calendar_date(input, self.tz)
    }

    /// Parse an optional query parameter; unparseable values count as absent.
    pub fn parse_opt(&self, input: Option<&str>) -> Option<NaiveDate> {
        input.and_then(|s| self.parse(s))
    }
}
