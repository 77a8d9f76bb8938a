//! Streaming validation passes
//!
//! Both passes run to the end of the file and collect every offending
//! line number; they never stop at the first problem.

use crate::error::Result;
use crate::parser::{LineEvent, LineKind, ReadableFile};
use crate::types::{LogTimestamp, Reading};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, error, info};

/// Which validation produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationKind {
    Pattern,
    Time,
}

/// Outcome of one pass: offending 1-based line numbers, empty when passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub kind: ValidationKind,
    pub bad_lines: Vec<usize>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.bad_lines.is_empty()
    }

    fn log(&self, name: &str) {
        if self.passed() {
            info!("File {} passed the {:?} check", name, self.kind);
        } else {
            let lines: Vec<String> = self.bad_lines.iter().map(|n| n.to_string()).collect();
            error!(
                "File {} did not pass the {:?} check, inconsistencies in line(s): {}",
                name,
                self.kind,
                lines.join(", ")
            );
        }
    }
}

/// Every non-blank line is a header or a reading, and no reading precedes all headers
pub fn validate_pattern_events<I>(events: I) -> Result<ValidationReport>
where
    I: Iterator<Item = Result<LineEvent>>,
{
    let mut bad_lines = Vec::new();
    let mut seen_header = false;

    for event in events {
        let event = event?;
        match event.kind {
            LineKind::Blank => {}
            LineKind::Header(_) => seen_header = true,
            LineKind::Reading(_) if seen_header => {}
            LineKind::Reading(_) | LineKind::Invalid(_) => bad_lines.push(event.number),
        }
    }

    Ok(ValidationReport {
        kind: ValidationKind::Pattern,
        bad_lines,
    })
}

/// Header timestamps never decrease; reading offsets never decrease within a session
pub fn validate_time_events<I>(events: I) -> Result<ValidationReport>
where
    I: Iterator<Item = Result<LineEvent>>,
{
    let mut bad_lines = Vec::new();
    let mut last_timestamp: Option<LogTimestamp> = None;
    let mut last_reading: Option<Reading> = None;

    for event in events {
        let event = event?;
        match event.kind {
            LineKind::Header(header) => {
                if let Some(previous) = last_timestamp {
                    if previous.cmp_instant(&header.timestamp) == Ordering::Greater {
                        bad_lines.push(event.number);
                    }
                }
                last_timestamp = Some(header.timestamp);
                // New session: the next reading has no baseline
                last_reading = None;
            }
            LineKind::Reading(reading) => {
                if let Some(previous) = last_reading {
                    if previous.millis_passed > reading.millis_passed {
                        bad_lines.push(event.number);
                    }
                }
                last_reading = Some(reading);
            }
            LineKind::Blank | LineKind::Invalid(_) => {}
        }
    }

    Ok(ValidationReport {
        kind: ValidationKind::Time,
        bad_lines,
    })
}

pub fn validate_pattern(file: &ReadableFile) -> Result<ValidationReport> {
    debug!("Pattern check of {}", file.path().display());
    let report = validate_pattern_events(file.events()?)?;
    report.log(&file.path().display().to_string());
    Ok(report)
}

pub fn validate_time(file: &ReadableFile) -> Result<ValidationReport> {
    debug!("Time check of {}", file.path().display());
    let report = validate_time_events(file.events()?)?;
    report.log(&file.path().display().to_string());
    Ok(report)
}

/// Both passes, each run to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValidation {
    pub pattern: ValidationReport,
    pub time: ValidationReport,
}

impl FileValidation {
    pub fn passed(&self) -> bool {
        self.pattern.passed() && self.time.passed()
    }
}

pub fn validate_file(file: &ReadableFile) -> Result<FileValidation> {
    Ok(FileValidation {
        pattern: validate_pattern(file)?,
        time: validate_time(file)?,
    })
}
