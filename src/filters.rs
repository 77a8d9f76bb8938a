//! Date-time window filtering for readings
//!
//! Every fold and export can be bounded by an inclusive `[start, end]`
//! window over the absolute time of readings. Either bound may be absent,
//! in which case that side of the window is open.
//!
//! # Usage
//!
//! Bounds usually come from user input in one of the two log formats:
//! `dd.mm.yyyy` or `dd.mm.yyyy-HH:MM:SS`. A date-only end bound covers the
//! whole day it names.

use crate::error::{MarpError, Result};
use crate::parser::grammar::parse_timestamp;
use crate::types::LogTimestamp;
use chrono::{NaiveDateTime, NaiveTime};

/// Which side of a window a user-supplied bound sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

/// Inclusive date-time window; `None` bounds are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateTimeWindow {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a window from optional user strings
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(|text| parse_window_bound(text, BoundKind::Start))
            .transpose()?;
        let end = end
            .map(|text| parse_window_bound(text, BoundKind::End))
            .transpose()?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        !self.is_before(instant) && !self.is_after(instant)
    }

    /// `instant` falls before the start bound
    pub fn is_before(&self, instant: NaiveDateTime) -> bool {
        self.start.map_or(false, |start| instant < start)
    }

    /// `instant` falls after the end bound
    pub fn is_after(&self, instant: NaiveDateTime) -> bool {
        self.end.map_or(false, |end| instant > end)
    }
}

/// Parse a window bound; date-only end bounds extend to the day's last millisecond
pub fn parse_window_bound(text: &str, kind: BoundKind) -> Result<NaiveDateTime> {
    let timestamp = parse_timestamp(text.trim())
        .map_err(|_| MarpError::InvalidDateTimePassed(text.to_string()))?;

    Ok(match (timestamp, kind) {
        (LogTimestamp::Date(date), BoundKind::End) => date.and_time(last_millisecond()),
        (timestamp, _) => timestamp.as_datetime(),
    })
}

fn last_millisecond() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}
