//! Export functionality for readings
//!
//! Contains the output path convention shared by reduction and splitting,
//! plus CSV export of derived readings and JSON export of metric summaries.

use std::path::{Path, PathBuf};

#[cfg(any(feature = "csv", feature = "json"))]
use crate::error::Result;

#[cfg(feature = "csv")]
use crate::error::MarpError;
#[cfg(feature = "csv")]
use crate::filters::DateTimeWindow;
#[cfg(feature = "csv")]
use crate::parser::{ParseMode, ReadableFile, SessionEvent};
#[cfg(feature = "csv")]
use crate::types::CountedReading;

/// `<dir>/<stem><suffix>`: `logs/ride.txt` + `_reduced.txt` -> `logs/ride_reduced.txt`
pub fn derived_path(input_path: &Path, suffix: &str) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "readings".to_string());
    let file_name = format!("{}{}", stem, suffix);
    match input_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

/// Export derived readings inside `window` to CSV.
///
/// Columns: `time,millis_passed,speed_kmh,voltage_v`. Returns the row count.
#[cfg(feature = "csv")]
pub fn export_counted_csv(
    file: &ReadableFile,
    window: &DateTimeWindow,
    mode: ParseMode,
    output_path: &Path,
) -> Result<usize> {
    if let Some(dir) = output_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let mut writer = csv::Writer::from_path(output_path)
        .map_err(|e| MarpError::Export(format!("cannot create {}: {}", output_path.display(), e)))?;
    writer
        .write_record(["time", "millis_passed", "speed_kmh", "voltage_v"])
        .map_err(|e| MarpError::Export(e.to_string()))?;

    let mut rows = 0;
    for event in file.sessions(mode)? {
        let SessionEvent::Reading(timed) = event? else {
            continue;
        };
        if window.is_before(timed.absolute_time) {
            continue;
        }
        if window.is_after(timed.absolute_time) {
            break;
        }

        let counted = CountedReading::new(&timed.reading, &timed.header);
        writer
            .write_record([
                timed.absolute_time.format("%d.%m.%Y-%H:%M:%S%.3f").to_string(),
                counted.millis_passed.to_string(),
                counted.speed_kmh.to_string(),
                counted.voltage_v.to_string(),
            ])
            .map_err(|e| MarpError::Export(e.to_string()))?;
        rows += 1;
    }

    writer.flush()?;
    tracing::info!("Exported {} reading(s) to {}", rows, output_path.display());
    Ok(rows)
}

/// Write a metric summary as pretty JSON
#[cfg(feature = "json")]
pub fn export_summary_json(summary: &crate::metrics::Summary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| crate::error::MarpError::Export(e.to_string()))?;
    std::fs::write(output_path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_path_keeps_directory() {
        let path = derived_path(Path::new("logs/ride.txt"), "_reduced.txt");
        assert_eq!(path, PathBuf::from("logs/ride_reduced.txt"));
    }

    #[test]
    fn test_derived_path_bare_file_name() {
        let path = derived_path(Path::new("ride.log"), "_part_3.txt");
        assert_eq!(path, PathBuf::from("ride_part_3.txt"));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_export_counted_csv_respects_window() {
        use crate::parser::MAXIMAL_FILE_LINES;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = temp_dir.path().join("ride.txt");
        std::fs::write(
            &input,
            "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )\n\
             {R} 0 | 5 | 800\n\
             {R} 1000 | 10 | 850\n\
             {R} 2000 | 10 | 850\n",
        )
        .unwrap();
        let file = ReadableFile::open(&input, MAXIMAL_FILE_LINES).unwrap();
        let window = DateTimeWindow::parse(None, Some("01.01.2024-08:00:01")).unwrap();
        let output = temp_dir.path().join("out").join("ride.csv");

        let rows = export_counted_csv(&file, &window, ParseMode::Strict, &output).unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,millis_passed,speed_kmh,voltage_v");
        assert!(lines[1].starts_with("01.01.2024-08:00:00.000,0,"));
        assert_eq!(lines.len(), 3);
    }
}
