//! Reduction: collapse duplicated headers into one
//!
//! A header whose timestamp equals the previously seen header's is dropped;
//! readings pass through unchanged and blank lines are removed. Applying the
//! reduction twice gives the same output as applying it once.

use crate::error::{MarpError, Result};
use crate::export::derived_path;
use crate::parser::{LineEvent, LineKind, ReadableFile};
use crate::types::LogTimestamp;
use crate::validation::validate_file;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const REDUCED_SUFFIX: &str = "_reduced.txt";

/// Line counts of a finished reduction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionStats {
    pub headers_kept: usize,
    pub headers_dropped: usize,
    pub readings: usize,
    /// Blank and malformed lines left out of the output
    pub lines_skipped: usize,
}

/// Stream `events` into `writer`, dropping duplicated headers
pub fn reduce_events<I, W>(events: I, writer: &mut W) -> Result<ReductionStats>
where
    I: Iterator<Item = Result<LineEvent>>,
    W: Write,
{
    let mut stats = ReductionStats::default();
    let mut last_timestamp: Option<LogTimestamp> = None;

    for event in events {
        let event = event?;
        match event.kind {
            LineKind::Header(header) => {
                let duplicate = last_timestamp
                    .map_or(false, |previous| previous.same_instant(&header.timestamp));
                last_timestamp = Some(header.timestamp);
                if duplicate {
                    stats.headers_dropped += 1;
                    continue;
                }
                writeln!(writer, "{}", event.raw)?;
                stats.headers_kept += 1;
            }
            LineKind::Reading(_) => {
                writeln!(writer, "{}", event.raw)?;
                stats.readings += 1;
            }
            LineKind::Blank => stats.lines_skipped += 1,
            LineKind::Invalid(reason) => {
                warn!("Dropping line {} from reduced output: {}", event.number, reason);
                stats.lines_skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// Write `<stem>_reduced.txt` next to the input and return its path.
///
/// With `check` set, the file must pass both validations first.
pub fn reduce_file(file: &ReadableFile, check: bool) -> Result<PathBuf> {
    if check && !validate_file(file)?.passed() {
        return Err(MarpError::InvalidResourceReduction(file.path().to_path_buf()));
    }

    let output_path = derived_path(file.path(), REDUCED_SUFFIX);
    debug!(
        "Reducing {} into {}",
        file.path().display(),
        output_path.display()
    );

    let mut writer = BufWriter::new(File::create(&output_path)?);
    let stats = reduce_events(file.events()?, &mut writer)?;
    writer.flush()?;

    info!(
        "Reduced {}: {} header(s) kept, {} duplicate(s) dropped, {} reading(s)",
        file.path().display(),
        stats.headers_kept,
        stats.headers_dropped,
        stats.readings
    );
    Ok(output_path)
}
