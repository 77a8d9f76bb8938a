use crate::error::{MarpError, Result};
use crate::parser::stream::{LineEvents, ParseMode, SessionEvent, SessionEvents};
use crate::types::{Header, Reading};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default guard against files too large for a single pass
pub const MAXIMAL_FILE_LINES: usize = 10_500_000;

/// A log file that exists, decodes as UTF-8 and fits the line-count guard.
///
/// Every entry point goes through this gate before streaming work starts.
#[derive(Debug, Clone)]
pub struct ReadableFile {
    path: PathBuf,
    line_count: usize,
}

impl ReadableFile {
    pub fn open(path: impl AsRef<Path>, max_lines: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(MarpError::ResourceNotFound(path));
        }

        let line_count = count_utf8_lines(&path)?;
        if line_count > max_lines {
            return Err(MarpError::ResourceSizeExceeded {
                path,
                lines: line_count,
                max_lines,
            });
        }

        debug!("Opened {} ({} lines)", path.display(), line_count);
        Ok(Self { path, line_count })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Fresh buffered reader positioned at the start of the file
    pub fn reader(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => MarpError::ResourceNotFound(self.path.clone()),
            _ => MarpError::Io(err),
        })?;
        Ok(BufReader::new(file))
    }

    /// Start a new forward pass over classified lines
    pub fn events(&self) -> Result<LineEvents<BufReader<File>>> {
        Ok(LineEvents::with_path(self.reader()?, self.path.clone()))
    }

    /// Start a new forward pass over associated header/reading events
    pub fn sessions(&self, mode: ParseMode) -> Result<SessionEvents<LineEvents<BufReader<File>>>> {
        Ok(SessionEvents::new(self.events()?, mode))
    }
}

/// Count lines, failing with the first line that is not valid UTF-8
fn count_utf8_lines(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut count = 0;

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(count);
        }
        count += 1;
        if std::str::from_utf8(&buffer).is_err() {
            return Err(MarpError::ResourceWrongEncoding {
                path: path.to_path_buf(),
                line: count,
            });
        }
    }
}

/// One logical session: a header and every reading it governs
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub line: usize,
    pub header: Header,
    pub readings: Vec<Reading>,
}

/// Materialize all sessions.
///
/// A repeated header (same timestamp and same calibration) merges into the
/// session before it. A same-timestamp header with other calibration opens a
/// new session, so every reading keeps the header that precedes it.
///
/// Holds the whole file in memory. Metric folds never use this.
pub fn collect_sessions<I>(events: I) -> Result<Vec<Session>>
where
    I: Iterator<Item = Result<SessionEvent>>,
{
    let mut sessions: Vec<Session> = Vec::new();

    for event in events {
        match event? {
            SessionEvent::Header {
                line,
                header,
                continuation,
            } => {
                let repeated = continuation
                    && sessions.last().map_or(false, |last| last.header == header);
                if !repeated {
                    sessions.push(Session {
                        line,
                        header,
                        readings: Vec::new(),
                    });
                }
            }
            SessionEvent::Reading(timed) => {
                if let Some(session) = sessions.last_mut() {
                    session.readings.push(timed.reading);
                }
            }
        }
    }

    Ok(sessions)
}

/// Parse a whole file into sessions (for display, not for metrics)
pub fn parse_sessions(file: &ReadableFile, mode: ParseMode) -> Result<Vec<Session>> {
    collect_sessions(file.sessions(mode)?)
}
