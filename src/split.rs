//! Split a log into parts at header boundaries
//!
//! A new part starts at the first header met once the current part holds
//! at least `part_size` lines, unless that header continues the previous
//! header's calendar day. A session is never cut, and neither is a day.

use crate::error::{MarpError, Result};
use crate::export::derived_path;
use crate::parser::{LineEvent, LineKind, ReadableFile};
use crate::types::Header;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const MAX_PARTS: usize = 1000;

/// Requested way of splitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitTarget {
    /// Roughly equal parts
    Parts(usize),
    /// At most this many lines per part, rounded up to the next header
    Lines(usize),
}

impl SplitTarget {
    /// Lines per part for a file of `line_count` lines, checking bounds
    pub fn part_size(&self, line_count: usize) -> Result<usize> {
        match *self {
            SplitTarget::Parts(parts) => {
                if parts < 2 || parts > MAX_PARTS || parts >= line_count {
                    return Err(MarpError::InvalidSplitTarget(format!(
                        "count of parts must be between 2 and {} and less than the line count ({})",
                        MAX_PARTS, line_count
                    )));
                }
                let size = (line_count as f64 / parts as f64).round() as usize;
                Ok(size.max(1))
            }
            SplitTarget::Lines(lines) => {
                if lines < 2 || lines >= line_count {
                    return Err(MarpError::InvalidSplitTarget(format!(
                        "lines per part must be at least 2 and less than the line count ({})",
                        line_count
                    )));
                }
                Ok(lines)
            }
        }
    }
}

/// Parts written by a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub part_size: usize,
    pub parts: Vec<PathBuf>,
}

/// Stream `events` into writers produced by `open_part` (1-based part index).
///
/// Returns the number of parts created. Blank and malformed lines are not copied.
pub fn split_events<I, W, F>(events: I, part_size: usize, mut open_part: F) -> Result<usize>
where
    I: Iterator<Item = Result<LineEvent>>,
    W: Write,
    F: FnMut(usize) -> Result<W>,
{
    let mut part_index = 1;
    let mut writer = open_part(part_index)?;
    let mut lines_in_part = 0;
    let mut last_header: Option<Header> = None;

    for event in events {
        let event = event?;
        match event.kind {
            LineKind::Header(header) => {
                let same_day = last_header
                    .map_or(false, |previous| previous.timestamp.date() == header.timestamp.date());
                if lines_in_part >= part_size && !same_day {
                    writer.flush()?;
                    part_index += 1;
                    writer = open_part(part_index)?;
                    lines_in_part = 0;
                }
                writeln!(writer, "{}", event.raw)?;
                lines_in_part += 1;
                last_header = Some(header);
            }
            LineKind::Reading(_) => {
                writeln!(writer, "{}", event.raw)?;
                lines_in_part += 1;
            }
            LineKind::Blank | LineKind::Invalid(_) => {}
        }
    }

    writer.flush()?;
    Ok(part_index)
}

pub fn part_path(file: &ReadableFile, index: usize) -> PathBuf {
    derived_path(file.path(), &format!("_part_{}.txt", index))
}

/// Write `<stem>_part_<n>.txt` files next to the input
pub fn split_file(file: &ReadableFile, target: SplitTarget) -> Result<SplitReport> {
    let part_size = target.part_size(file.line_count())?;
    debug!(
        "Splitting {} ({} lines) into parts of {} lines",
        file.path().display(),
        file.line_count(),
        part_size
    );

    let mut parts = Vec::new();
    let created = split_events(file.events()?, part_size, |index| {
        let path = part_path(file, index);
        let writer = BufWriter::new(File::create(&path)?);
        parts.push(path);
        Ok(writer)
    })?;

    if let SplitTarget::Parts(requested) = target {
        if created != requested {
            warn!(
                "File could not be divided into {} parts because there were fewer header boundaries, {} files were created",
                requested, created
            );
        }
    }
    info!("Split {} into {} part(s)", file.path().display(), created);

    Ok(SplitReport { part_size, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineEvents;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    /// Shared in-memory part so the test can inspect it after the split
    #[derive(Clone, Default)]
    struct Part(Rc<RefCell<Vec<u8>>>);

    impl Write for Part {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn split_str(input: &str, part_size: usize) -> Vec<String> {
        let parts: RefCell<Vec<Part>> = RefCell::new(Vec::new());
        let created = split_events(LineEvents::new(Cursor::new(input)), part_size, |_| {
            let part = Part::default();
            parts.borrow_mut().push(part.clone());
            Ok(part)
        })
        .unwrap();
        let parts = parts.into_inner();
        assert_eq!(created, parts.len());
        parts
            .into_iter()
            .map(|part| String::from_utf8(part.0.borrow().clone()).unwrap())
            .collect()
    }

    const THREE_DAYS: &str = "{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
                              {R} 0 | 1 | 1\n\
                              {R} 1 | 1 | 1\n\
                              {H} 02.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
                              {R} 0 | 1 | 1\n\
                              {R} 1 | 1 | 1\n\
                              {H} 03.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
                              {R} 0 | 1 | 1\n\
                              {R} 1 | 1 | 1\n";

    #[test]
    fn test_split_only_at_headers() {
        let parts = split_str(THREE_DAYS, 5);
        assert_eq!(parts.len(), 2);
        for part in &parts {
            assert!(part.starts_with("{H}"), "part must start with a header: {part}");
        }
        assert_eq!(parts[0].lines().count(), 6);
        assert_eq!(parts[1].lines().count(), 3);
    }

    #[test]
    fn test_same_day_header_defers_split() {
        let input = "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
                     {R} 0 | 1 | 1\n\
                     {R} 1 | 1 | 1\n\
                     {H} 01.01.2024-18:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
                     {R} 0 | 1 | 1\n\
                     {H} 02.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
                     {R} 0 | 1 | 1\n";
        let parts = split_str(input, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].lines().count(), 5);
        assert!(parts[1].starts_with("{H} 02.01.2024"));
    }

    #[test]
    fn test_split_runs_out_of_headers() {
        let parts = split_str(THREE_DAYS, 1);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_part_size_bounds() {
        assert_eq!(SplitTarget::Parts(2).part_size(9).unwrap(), 5);
        assert_eq!(SplitTarget::Parts(3).part_size(10).unwrap(), 3);
        assert_eq!(SplitTarget::Lines(4).part_size(9).unwrap(), 4);
        assert!(SplitTarget::Parts(1).part_size(9).is_err());
        assert!(SplitTarget::Parts(9).part_size(9).is_err());
        assert!(SplitTarget::Parts(1001).part_size(5000).is_err());
        assert!(SplitTarget::Lines(1).part_size(9).is_err());
        assert!(matches!(
            SplitTarget::Lines(9).part_size(9),
            Err(MarpError::InvalidSplitTarget(_))
        ));
    }
}
