use std::path::PathBuf;
use thiserror::Error;

/// Reasons a single line fails the Header, Reading or CountedReading grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// Line is empty or holds only a newline
    #[error("blank line")]
    Blank,
    /// Wrong number of space-delimited tokens
    #[error("expected {expected} tokens, found {found}")]
    Arity { expected: usize, found: usize },
    /// First token is not the expected sigil
    #[error("expected sigil {expected}, found '{found}'")]
    Sigil {
        expected: &'static str,
        found: String,
    },
    /// A fixed separator token (`(`, `|`, `)`) is missing
    #[error("expected separator '{expected}' at token {position}")]
    Separator {
        expected: &'static str,
        position: usize,
    },
    /// Date token matches neither `dd.mm.yyyy` nor `dd.mm.yyyy-HH:MM:SS`
    #[error("invalid date '{0}'")]
    Date(String),
    /// Numeric field could not be parsed or is out of range
    #[error("invalid value '{value}' for {field}")]
    Number { field: &'static str, value: String },
}

/// Custom error types for readings processing
#[derive(Error, Debug)]
pub enum MarpError {
    /// Input path does not exist or is not a regular file
    #[error("No such file or directory: {0}")]
    ResourceNotFound(PathBuf),

    /// Input is not valid UTF-8
    #[error("File {path} has characters incompatible with UTF-8 encoding (line {line})")]
    ResourceWrongEncoding { path: PathBuf, line: usize },

    /// Input holds more lines than the configured maximum
    #[error("File {path} size ({lines} lines) exceeds the allowable size ({max_lines} lines), split the file before processing")]
    ResourceSizeExceeded {
        path: PathBuf,
        lines: usize,
        max_lines: usize,
    },

    /// A non-blank line matches neither Header nor Reading grammar
    #[error("Found line that does not fit any available template: line {line} ({reason})")]
    MalformedLine { line: usize, reason: GrammarError },

    /// A Reading appears before any Header
    #[error("Detected reading without header, it is unclear what to bind to: line {line}")]
    ReadingWithoutHeader { line: usize },

    /// A user supplied date/time filter fails both accepted formats
    #[error("'{0}' could not be converted to a date or datetime (requires dd.mm.yyyy or dd.mm.yyyy-HH:MM:SS)")]
    InvalidDateTimePassed(String),

    /// Reduction requested on a file that failed validation
    #[error("File {0} did not pass validation, no further reduction is possible")]
    InvalidResourceReduction(PathBuf),

    /// Split target out of the accepted bounds
    #[error("Invalid split target: {0}")]
    InvalidSplitTarget(String),

    /// Configuration file could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Export format error
    #[error("Export error: {0}")]
    Export(String),

    /// I/O errors without a more specific kind
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MarpError {
    /// Stable numeric code per error kind, shown next to CLI error messages
    pub fn code(&self) -> u16 {
        match self {
            MarpError::ResourceSizeExceeded { .. } => 421,
            MarpError::ResourceNotFound(_) => 582,
            MarpError::ResourceWrongEncoding { .. } => 638,
            MarpError::InvalidResourceReduction(_) => 472,
            MarpError::MalformedLine { .. } => 124,
            MarpError::ReadingWithoutHeader { .. } => 491,
            MarpError::InvalidDateTimePassed(_) => 461,
            MarpError::InvalidSplitTarget(_) => 433,
            MarpError::Config(_) => 310,
            MarpError::Export(_) => 350,
            MarpError::Io(_) => 1,
        }
    }

    /// 1-based line number the error is attached to, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            MarpError::ResourceWrongEncoding { line, .. }
            | MarpError::MalformedLine { line, .. }
            | MarpError::ReadingWithoutHeader { line } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarpError>;
