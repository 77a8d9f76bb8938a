use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Header timestamp as written in the log: a bare date or a full date-time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogTimestamp {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl LogTimestamp {
    /// Instant the timestamp denotes; a bare date is midnight
    pub fn as_datetime(&self) -> NaiveDateTime {
        match self {
            LogTimestamp::Date(date) => date.and_time(NaiveTime::MIN),
            LogTimestamp::DateTime(datetime) => *datetime,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            LogTimestamp::Date(date) => *date,
            LogTimestamp::DateTime(datetime) => datetime.date(),
        }
    }

    /// Both timestamps denote the same instant (`01.01.2024` equals `01.01.2024-00:00:00`)
    pub fn same_instant(&self, other: &LogTimestamp) -> bool {
        self.as_datetime() == other.as_datetime()
    }

    pub fn cmp_instant(&self, other: &LogTimestamp) -> Ordering {
        self.as_datetime().cmp(&other.as_datetime())
    }
}

impl fmt::Display for LogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTimestamp::Date(date) => write!(f, "{}", date.format("%d.%m.%Y")),
            LogTimestamp::DateTime(datetime) => {
                write!(f, "{}", datetime.format("%d.%m.%Y-%H:%M:%S"))
            }
        }
    }
}

/// Session header: timestamp plus the calibration used to derive readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub timestamp: LogTimestamp,
    pub spokes_count: u32,
    pub wheel_circumference_mm: u32,
    /// Sampling interval in seconds
    pub save_delay_seconds: f64,
    /// Calibration reference for the 10-bit ADC
    pub max_voltage: f64,
}

impl Header {
    pub fn datetime(&self) -> NaiveDateTime {
        self.timestamp.as_datetime()
    }
}
