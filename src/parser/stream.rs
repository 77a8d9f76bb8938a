use crate::error::{GrammarError, MarpError, Result};
use crate::parser::grammar::{is_blank, parse_header, parse_reading, strip_line_ending};
use crate::types::{Header, Reading};
use chrono::NaiveDateTime;
use std::io::{BufRead, ErrorKind};
use std::path::PathBuf;
use tracing::warn;

/// Classification of one source line
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Header(Header),
    Reading(Reading),
    Blank,
    Invalid(GrammarError),
}

/// One classified line with its 1-based number and raw text (line ending stripped)
#[derive(Debug, Clone, PartialEq)]
pub struct LineEvent {
    pub number: usize,
    pub raw: String,
    pub kind: LineKind,
}

impl LineEvent {
    pub fn classify(number: usize, raw: &str) -> Self {
        let raw = strip_line_ending(raw);
        let kind = if is_blank(raw) {
            LineKind::Blank
        } else {
            match parse_header(raw) {
                Ok(header) => LineKind::Header(header),
                Err(header_err) => match parse_reading(raw) {
                    Ok(reading) => LineKind::Reading(reading),
                    Err(reading_err) => {
                        // Report the grammar the line's sigil was aiming at
                        if raw.starts_with(crate::parser::grammar::READING_SIGIL) {
                            LineKind::Invalid(reading_err)
                        } else {
                            LineKind::Invalid(header_err)
                        }
                    }
                },
            }
        };
        Self {
            number,
            raw: raw.to_string(),
            kind,
        }
    }
}

/// Lazy forward iterator over the classified lines of a source.
///
/// Finite and not restartable: a new pass needs a new reader.
pub struct LineEvents<R: BufRead> {
    reader: R,
    path: PathBuf,
    line_number: usize,
    buffer: String,
    done: bool,
}

impl<R: BufRead> LineEvents<R> {
    pub fn new(reader: R) -> Self {
        Self::with_path(reader, PathBuf::from("<stream>"))
    }

    /// `path` is only used for error reporting
    pub fn with_path(reader: R, path: PathBuf) -> Self {
        Self {
            reader,
            path,
            line_number: 0,
            buffer: String::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineEvents<R> {
    type Item = Result<LineEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buffer.clear();
        self.line_number += 1;
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(LineEvent::classify(self.line_number, &self.buffer))),
            Err(err) => {
                self.done = true;
                if err.kind() == ErrorKind::InvalidData {
                    Some(Err(MarpError::ResourceWrongEncoding {
                        path: self.path.clone(),
                        line: self.line_number,
                    }))
                } else {
                    Some(Err(MarpError::Io(err)))
                }
            }
        }
    }
}

/// How association treats malformed lines and orphan readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Abort on the first malformed line or reading without header
    #[default]
    Strict,
    /// Skip offending lines with a warning
    Fix,
}

/// A reading bound to its governing header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedReading {
    pub line: usize,
    pub header: Header,
    pub reading: Reading,
    pub absolute_time: NaiveDateTime,
}

/// Header/reading events after association
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Header {
        line: usize,
        header: Header,
        /// Same timestamp as the previous header: the same logical session continues
        continuation: bool,
    },
    Reading(TimedReading),
}

/// Binds every reading to the most recently seen header
pub struct SessionEvents<I> {
    lines: I,
    mode: ParseMode,
    current: Option<Header>,
    failed: bool,
}

impl<I> SessionEvents<I>
where
    I: Iterator<Item = Result<LineEvent>>,
{
    pub fn new(lines: I, mode: ParseMode) -> Self {
        Self {
            lines,
            mode,
            current: None,
            failed: false,
        }
    }

    fn fail_or_skip(&mut self, err: MarpError) -> Option<Result<SessionEvent>> {
        match self.mode {
            ParseMode::Strict => {
                self.failed = true;
                Some(Err(err))
            }
            ParseMode::Fix => {
                warn!("Skipping line: {}", err);
                None
            }
        }
    }
}

impl<I> Iterator for SessionEvents<I>
where
    I: Iterator<Item = Result<LineEvent>>,
{
    type Item = Result<SessionEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let event = match self.lines.next()? {
                Ok(event) => event,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };

            match event.kind {
                LineKind::Blank => continue,
                LineKind::Header(header) => {
                    let continuation = self
                        .current
                        .map_or(false, |prev| prev.timestamp.same_instant(&header.timestamp));
                    self.current = Some(header);
                    return Some(Ok(SessionEvent::Header {
                        line: event.number,
                        header,
                        continuation,
                    }));
                }
                LineKind::Reading(reading) => {
                    let Some(header) = self.current else {
                        let err = MarpError::ReadingWithoutHeader { line: event.number };
                        match self.fail_or_skip(err) {
                            Some(item) => return Some(item),
                            None => continue,
                        }
                    };
                    let Some(absolute_time) = reading.absolute_time(&header) else {
                        let err = MarpError::MalformedLine {
                            line: event.number,
                            reason: GrammarError::Number {
                                field: "millis_passed",
                                value: reading.millis_passed.to_string(),
                            },
                        };
                        match self.fail_or_skip(err) {
                            Some(item) => return Some(item),
                            None => continue,
                        }
                    };
                    return Some(Ok(SessionEvent::Reading(TimedReading {
                        line: event.number,
                        header,
                        reading,
                        absolute_time,
                    })));
                }
                LineKind::Invalid(reason) => {
                    let err = MarpError::MalformedLine {
                        line: event.number,
                        reason,
                    };
                    match self.fail_or_skip(err) {
                        Some(item) => return Some(item),
                        None => continue,
                    }
                }
            }
        }
    }
}

/// Associate a buffered source in one call
pub fn session_events<R: BufRead>(
    reader: R,
    mode: ParseMode,
) -> SessionEvents<LineEvents<R>> {
    SessionEvents::new(LineEvents::new(reader), mode)
}
