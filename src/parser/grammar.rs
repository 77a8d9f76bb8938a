//! Line grammar for readings logs
//!
//! A log holds two kinds of space-delimited lines:
//!
//! ```text
//! {H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )
//! {R} 1000 | 10 | 850
//! ```
//!
//! Classification and parsing share one code path, so `is_header(s)` is
//! true exactly when `parse_header(s)` succeeds (same for readings).

use crate::error::GrammarError;
use crate::types::{CountedReading, Header, LogTimestamp, Reading};
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

pub const HEADER_SIGIL: &str = "{H}";
pub const READING_SIGIL: &str = "{R}";

pub const HEADER_PATTERN: &str = "{H} datetime[dd.mm.yyyy or dd.mm.yyyy-HH:MM:SS] ( int[spokes_count] | int[wheel_circumference_mm] | float[save_delay_s] | number[max_voltage] )";
pub const READING_PATTERN: &str =
    "{R} int[millis_passed] | int[impulse_count] | int[analog_voltage]";
pub const COUNTED_READING_PATTERN: &str =
    "{R} int[millis_passed] | float[speed_kmh] | float[voltage_v]";

const HEADER_ARITY: usize = 11;
const READING_ARITY: usize = 6;

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP.get_or_init(|| {
        Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4})(?:-(\d{2}):(\d{2}):(\d{2}))?$")
            .expect("timestamp pattern is valid")
    })
}

/// Strip one trailing `\n` or `\r\n`
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// `""` and `"\n"` are blank; blank lines are neither headers nor readings
pub fn is_blank(line: &str) -> bool {
    strip_line_ending(line).is_empty()
}

/// Parse `dd.mm.yyyy` or `dd.mm.yyyy-HH:MM:SS`
pub fn parse_timestamp(token: &str) -> Result<LogTimestamp, GrammarError> {
    let invalid = || GrammarError::Date(token.to_string());
    let caps = timestamp_regex().captures(token).ok_or_else(invalid)?;
    let field = |index: usize| -> Result<u32, GrammarError> {
        caps.get(index)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())
    };

    let year = i32::try_from(field(3)?).map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(1)?).ok_or_else(invalid)?;

    if caps.get(4).is_none() {
        return Ok(LogTimestamp::Date(date));
    }

    let time = NaiveTime::from_hms_opt(field(4)?, field(5)?, field(6)?).ok_or_else(invalid)?;
    Ok(LogTimestamp::DateTime(date.and_time(time)))
}

pub fn is_header(line: &str) -> bool {
    parse_header(line).is_ok()
}

pub fn parse_header(line: &str) -> Result<Header, GrammarError> {
    let tokens = tokenize(line, HEADER_ARITY, HEADER_SIGIL)?;
    expect_separator(&tokens, 2, "(")?;
    expect_separator(&tokens, 4, "|")?;
    expect_separator(&tokens, 6, "|")?;
    expect_separator(&tokens, 8, "|")?;
    expect_separator(&tokens, 10, ")")?;

    let header = Header {
        timestamp: parse_timestamp(tokens[1])?,
        spokes_count: parse_positive_int(tokens[3], "spokes_count")?,
        wheel_circumference_mm: parse_positive_int(tokens[5], "wheel_circumference_mm")?,
        save_delay_seconds: parse_positive_float(tokens[7], "save_delay_s")?,
        max_voltage: parse_positive_float(tokens[9], "max_voltage")?,
    };
    Ok(header)
}

pub fn is_reading(line: &str) -> bool {
    parse_reading(line).is_ok()
}

pub fn parse_reading(line: &str) -> Result<Reading, GrammarError> {
    let tokens = tokenize(line, READING_ARITY, READING_SIGIL)?;
    expect_separator(&tokens, 2, "|")?;
    expect_separator(&tokens, 4, "|")?;

    Ok(Reading {
        millis_passed: parse_unsigned(tokens[1], "millis_passed")?,
        impulse_count: parse_unsigned(tokens[3], "impulse_count")?,
        analog_voltage: parse_unsigned(tokens[5], "analog_voltage")?,
    })
}

/// Recognizes the derived form written by `format_counted_reading`.
/// Raw readings also match, since integers are valid floats.
pub fn is_counted_reading(line: &str) -> bool {
    parse_counted_reading(line).is_ok()
}

pub fn parse_counted_reading(line: &str) -> Result<CountedReading, GrammarError> {
    let tokens = tokenize(line, READING_ARITY, READING_SIGIL)?;
    expect_separator(&tokens, 2, "|")?;
    expect_separator(&tokens, 4, "|")?;

    Ok(CountedReading {
        millis_passed: parse_unsigned(tokens[1], "millis_passed")?,
        speed_kmh: parse_non_negative_float(tokens[3], "speed_kmh")?,
        voltage_v: parse_non_negative_float(tokens[5], "voltage_v")?,
        absolute_time: None,
    })
}

pub fn format_header(header: &Header) -> String {
    format!(
        "{} {} ( {} | {} | {} | {} )",
        HEADER_SIGIL,
        header.timestamp,
        header.spokes_count,
        header.wheel_circumference_mm,
        header.save_delay_seconds,
        header.max_voltage
    )
}

pub fn format_reading(reading: &Reading) -> String {
    format!(
        "{} {} | {} | {}",
        READING_SIGIL, reading.millis_passed, reading.impulse_count, reading.analog_voltage
    )
}

pub fn format_counted_reading(reading: &CountedReading) -> String {
    format!(
        "{} {} | {} | {}",
        READING_SIGIL, reading.millis_passed, reading.speed_kmh, reading.voltage_v
    )
}

fn tokenize<'a>(
    line: &'a str,
    arity: usize,
    sigil: &'static str,
) -> Result<Vec<&'a str>, GrammarError> {
    let line = strip_line_ending(line);
    if line.is_empty() {
        return Err(GrammarError::Blank);
    }

    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() != arity {
        return Err(GrammarError::Arity {
            expected: arity,
            found: tokens.len(),
        });
    }
    if tokens[0] != sigil {
        return Err(GrammarError::Sigil {
            expected: sigil,
            found: tokens[0].to_string(),
        });
    }
    Ok(tokens)
}

fn expect_separator(
    tokens: &[&str],
    position: usize,
    expected: &'static str,
) -> Result<(), GrammarError> {
    if tokens[position] == expected {
        Ok(())
    } else {
        Err(GrammarError::Separator { expected, position })
    }
}

/// Digits only: rejects signs, which `str::parse` would accept
fn parse_unsigned<T: FromStr>(token: &str, field: &'static str) -> Result<T, GrammarError> {
    let invalid = || GrammarError::Number {
        field,
        value: token.to_string(),
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    token.parse().map_err(|_| invalid())
}

fn parse_positive_int(token: &str, field: &'static str) -> Result<u32, GrammarError> {
    let value: u32 = parse_unsigned(token, field)?;
    if value == 0 {
        return Err(GrammarError::Number {
            field,
            value: token.to_string(),
        });
    }
    Ok(value)
}

fn parse_float(token: &str, field: &'static str) -> Result<f64, GrammarError> {
    let invalid = || GrammarError::Number {
        field,
        value: token.to_string(),
    };
    let value: f64 = token.parse().map_err(|_| invalid())?;
    if !value.is_finite() || token.starts_with('+') {
        return Err(invalid());
    }
    Ok(value)
}

fn parse_positive_float(token: &str, field: &'static str) -> Result<f64, GrammarError> {
    let value = parse_float(token, field)?;
    if value <= 0.0 {
        return Err(GrammarError::Number {
            field,
            value: token.to_string(),
        });
    }
    Ok(value)
}

fn parse_non_negative_float(token: &str, field: &'static str) -> Result<f64, GrammarError> {
    let value = parse_float(token, field)?;
    if value < 0.0 {
        return Err(GrammarError::Number {
            field,
            value: token.to_string(),
        });
    }
    Ok(value)
}
