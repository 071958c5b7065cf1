//! CSV export of filtered reading history.
//!
//! The only persisted artifact this crate produces: four columns, one row
//! per reading, in the order the filter engine returned them (newest first
//! for history exports).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::data::reading::Reading;
use crate::error::ExportError;

const FILE_PREFIX: &str = "pulsewatch_history_";
const FILE_EXTENSION: &str = "csv";

/// Write readings as CSV to any writer.
///
/// Columns: `Date` (yyyy-MM-dd), `Time` (HH:mm:ss), `Heart Rate (bpm)`,
/// `SpO2 (%)`. Dates and times are local wall-clock.
pub fn write_csv<W: Write>(readings: &[Reading], writer: W) -> Result<(), ExportError> {
    if readings.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["Date", "Time", "Heart Rate (bpm)", "SpO2 (%)"])?;

    for reading in readings {
        let (date, time) = match reading.local_time() {
            Some(local) => (
                local.format("%Y-%m-%d").to_string(),
                local.format("%H:%M:%S").to_string(),
            ),
            // Timestamp outside the representable range; keep the row
            None => (String::new(), String::new()),
        };
        csv_writer.write_record([
            date,
            time,
            reading.heart_rate.to_string(),
            reading.spo2.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Default export filename, timestamped so repeated exports never collide.
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        FILE_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        FILE_EXTENSION
    )
}

/// Export readings into `dir` under a timestamped default filename and
/// return the path written.
pub fn export_to_dir(readings: &[Reading], dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(default_file_name(Local::now()));
    export_to_file(readings, &path)?;
    Ok(path)
}

/// Export readings to an explicit file path.
pub fn export_to_file(readings: &[Reading], path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_csv(readings, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_readings() -> Vec<Reading> {
        vec![
            Reading {
                heart_rate: 80,
                spo2: 97,
                timestamp: 1_700_000_100,
                ..Reading::default()
            },
            Reading {
                heart_rate: 72,
                spo2: 98,
                timestamp: 1_700_000_000,
                ..Reading::default()
            },
        ]
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&sample_readings(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Time,Heart Rate (bpm),SpO2 (%)"
        );
        let first = lines.next().unwrap();
        assert!(first.ends_with(",80,97"), "unexpected row: {}", first);
        let second = lines.next().unwrap();
        assert!(second.ends_with(",72,98"), "unexpected row: {}", second);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_row_order_matches_input() {
        let mut buf = Vec::new();
        write_csv(&sample_readings(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let hr_column: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(2).unwrap())
            .collect();
        assert_eq!(hr_column, vec!["80", "72"]);
    }

    #[test]
    fn test_empty_set_is_rejected() {
        let mut buf = Vec::new();
        let err = write_csv(&[], &mut buf).unwrap_err();
        assert!(matches!(err, ExportError::Empty));
    }

    #[test]
    fn test_export_to_dir_creates_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_to_dir(&sample_readings(), dir.path()).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(FILE_PREFIX));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_default_file_name_format() {
        let now = Local.with_ymd_and_hms(2024, 1, 15, 9, 30, 5).unwrap();
        assert_eq!(
            default_file_name(now),
            "pulsewatch_history_20240115_093005.csv"
        );
    }
}
