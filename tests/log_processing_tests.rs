//! Integration tests for on-disk log processing
//!
//! Tests the library end to end on temporary files:
//! - Parsing sessions and deriving readings
//! - Pattern and time validation
//! - Reduction output and idempotence
//! - Splitting at header boundaries
//! - Metric passes bounded by a time window
//! - Resource gate errors

use marp::metrics::{self, MetricOptions};
use marp::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASIC_LOG: &str = "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
                         {R} 0 | 5 | 800\n\
                         {R} 1000 | 10 | 850\n";

fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write log");
    path
}

fn open(path: &Path) -> ReadableFile {
    ReadableFile::open(path, MAXIMAL_FILE_LINES).expect("Failed to open log")
}

#[test]
fn test_basic_parse_single_session() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(&temp_dir, "ride.txt", BASIC_LOG);
    let file = open(&path);
    assert_eq!(file.line_count(), 3);

    let sessions = parse_sessions(&file, ParseMode::Strict).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].readings.len(), 2);

    let counted = CountedReading::new(&sessions[0].readings[0], &sessions[0].header);
    assert!((counted.speed_kmh - 1.89).abs() < 1e-9);
}

#[test]
fn test_every_reading_bound_to_preceding_header() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "two.txt",
        "{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 1 | 1\n\
         \n\
         {H} 02.01.2024 ( 28 | 2000 | 2.0 | 24 )\n\
         {R} 0 | 1 | 1\n\
         {R} 10 | 1 | 1\n",
    );
    let file = open(&path);

    let mut last_header_line = 0;
    let mut bindings = Vec::new();
    for event in file.sessions(ParseMode::Strict).unwrap() {
        match event.unwrap() {
            SessionEvent::Header { line, .. } => last_header_line = line,
            SessionEvent::Reading(timed) => {
                bindings.push((timed.line, last_header_line, timed.header.spokes_count))
            }
        }
    }
    assert_eq!(bindings, vec![(2, 1, 20), (5, 4, 28), (6, 4, 28)]);
}

#[test]
fn test_reading_before_any_header_fails_strict() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "orphan.txt",
        "{R} 0 | 1 | 1\n{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n{R} 0 | 1 | 1\n",
    );
    let file = open(&path);

    let err = parse_sessions(&file, ParseMode::Strict).unwrap_err();
    assert!(matches!(err, MarpError::ReadingWithoutHeader { line: 1 }));

    let sessions = parse_sessions(&file, ParseMode::Fix).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].readings.len(), 1);
}

#[test]
fn test_time_validation_reports_second_header() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "backwards.txt",
        "{H} 02.01.2024 ( 20 | 2100 | 1.0 | 12 )\n{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n",
    );
    let file = open(&path);

    let time = validate_time(&file).unwrap();
    assert_eq!(time.bad_lines, vec![2]);
    assert!(validate_pattern(&file).unwrap().passed());
    assert!(!validate_file(&file).unwrap().passed());
}

#[test]
fn test_reduction_on_disk_is_idempotent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "dup.txt",
        "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
         {H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 5 | 800\n\
         {R} 1000 | 10 | 850\n",
    );
    let file = open(&path);

    let reduced_path = reduce_file(&file, true).unwrap();
    assert_eq!(reduced_path, temp_dir.path().join("dup_reduced.txt"));
    let reduced = fs::read_to_string(&reduced_path).unwrap();
    assert_eq!(
        reduced,
        "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 5 | 800\n\
         {R} 1000 | 10 | 850\n"
    );

    let again_path = reduce_file(&open(&reduced_path), true).unwrap();
    assert_eq!(fs::read_to_string(again_path).unwrap(), reduced);
}

#[test]
fn test_reduction_refuses_invalid_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(&temp_dir, "bad.txt", "{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\nnoise\n");
    let file = open(&path);

    let err = reduce_file(&file, true).unwrap_err();
    assert!(matches!(err, MarpError::InvalidResourceReduction(_)));
    assert_eq!(err.code(), 472);
    assert!(!temp_dir.path().join("bad_reduced.txt").exists());

    // Unchecked reduction drops the noise line
    let reduced_path = reduce_file(&file, false).unwrap();
    assert_eq!(fs::read_to_string(reduced_path).unwrap().lines().count(), 1);
}

#[test]
fn test_split_three_headers_into_two_parts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "days.txt",
        "{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 1 | 1\n\
         {R} 1 | 1 | 1\n\
         {H} 02.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 1 | 1\n\
         {R} 1 | 1 | 1\n\
         {H} 03.01.2024 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 1 | 1\n\
         {R} 1 | 1 | 1\n",
    );
    let file = open(&path);

    let report = split_file(&file, SplitTarget::Parts(2)).unwrap();
    assert_eq!(report.part_size, 5);
    assert_eq!(
        report.parts,
        vec![
            temp_dir.path().join("days_part_1.txt"),
            temp_dir.path().join("days_part_2.txt"),
        ]
    );

    let mut total_lines = 0;
    for part in &report.parts {
        let content = fs::read_to_string(part).unwrap();
        assert!(content.starts_with("{H}"), "part must open with a header");
        // Each header's block stays whole
        let part_file = open(part);
        let sessions = parse_sessions(&part_file, ParseMode::Strict).unwrap();
        assert!(sessions.iter().all(|s| s.readings.len() == 2));
        total_lines += content.lines().count();
    }
    assert_eq!(total_lines, 9);
}

#[test]
fn test_split_rejects_too_many_parts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(&temp_dir, "short.txt", BASIC_LOG);
    let err = split_file(&open(&path), SplitTarget::Parts(3)).unwrap_err();
    assert!(matches!(err, MarpError::InvalidSplitTarget(_)));
}

#[test]
fn test_empty_voltage_interval() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "low.txt",
        "{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n{R} 0 | 1 | 100\n{R} 10 | 1 | 200\n",
    );
    let interval =
        metrics::voltage_interval(&open(&path), &MetricOptions::default(), 12.0).unwrap();
    assert_eq!(interval, None);
}

#[test]
fn test_metrics_inside_window() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(
        &temp_dir,
        "window.txt",
        "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 10 | 1023\n\
         {R} 60000 | 10 | 1023\n\
         {H} 02.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
         {R} 0 | 20 | 1023\n\
         {R} 60000 | 20 | 1023\n",
    );
    let file = open(&path);

    let whole = MetricOptions::default();
    assert_eq!(metrics::travel_time(&file, &whole).unwrap(), 120.0);

    let first_day = MetricOptions::new(
        DateTimeWindow::parse(None, Some("01.01.2024")).unwrap(),
        ParseMode::Strict,
    );
    assert_eq!(metrics::travel_time(&file, &first_day).unwrap(), 60.0);
    let speed = metrics::average_speed(&file, &first_day).unwrap();
    assert!((speed - 10.0 * 0.378).abs() < 1e-9);

    let days = metrics::daily_travel(&file, &whole).unwrap();
    assert_eq!(days.len(), 2);
    assert!(days[1].travel_distance_km > days[0].travel_distance_km);

    let summary = metrics::summary(&file, &whole, 12.0).unwrap();
    assert_eq!(summary.travel_time_s, 120.0);
    assert_eq!(
        summary.voltage_interval,
        Some(VoltageInterval { min: 12.0, max: 12.0 })
    );
}

#[test]
fn test_missing_file_and_size_gate() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = temp_dir.path().join("missing.txt");
    let err = ReadableFile::open(&missing, MAXIMAL_FILE_LINES).unwrap_err();
    assert!(matches!(err, MarpError::ResourceNotFound(_)));

    let path = write_log(&temp_dir, "big.txt", BASIC_LOG);
    let err = ReadableFile::open(&path, 2).unwrap_err();
    assert!(matches!(
        err,
        MarpError::ResourceSizeExceeded { lines: 3, max_lines: 2, .. }
    ));
}

#[test]
fn test_non_utf8_file_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("binary.txt");
    fs::write(&path, b"{H} 01.01.2024 ( 20 | 2100 | 1.0 | 12 )\n{R} 0 | \xff | 1\n").unwrap();

    let err = ReadableFile::open(&path, MAXIMAL_FILE_LINES).unwrap_err();
    assert!(matches!(err, MarpError::ResourceWrongEncoding { line: 2, .. }));
}
