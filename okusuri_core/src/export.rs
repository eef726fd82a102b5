//! CSV export of medication logs.

use crate::status::latest_per_day;
use crate::{LogEntry, Result};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    has_bleeding: bool,
    recorded_at: String,
    id: String,
}

/// Write one row per calendar day, oldest first
///
/// Days with several entries are collapsed to the authoritative one, the same
/// way the status calculation sees them. Returns the number of rows written.
pub fn write_logs_csv(logs: &[LogEntry], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for (date, entry) in latest_per_day(logs) {
        writer.serialize(CsvRow {
            date: date.format("%Y-%m-%d").to_string(),
            has_bleeding: entry.has_bleeding,
            recorded_at: entry.recorded_at.to_rfc3339(),
            id: entry.id.to_string(),
        })?;
        rows += 1;
    }

    writer.flush()?;
    tracing::info!("Exported {} days to {:?}", rows, path);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn entry(day: u32, hour: u32, has_bleeding: bool) -> LogEntry {
        LogEntry::new(
            "alice",
            NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            has_bleeding,
            Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_export_collapses_and_sorts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export").join("logs.csv");
        let logs = vec![
            entry(3, 8, false),
            entry(1, 8, false),
            entry(3, 21, true),
            entry(2, 8, false),
        ];

        let rows = export_rows(&logs, &path);

        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "2025-06-01");
        assert_eq!(&rows[2][0], "2025-06-03");
        assert_eq!(&rows[2][1], "true");
        assert_eq!(&rows[2][3], logs[2].id.to_string().as_str());
    }

    #[test]
    fn test_export_empty_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("logs.csv");

        assert_eq!(write_logs_csv(&[], &path).unwrap(), 0);
        assert!(path.exists());
    }

    fn export_rows(logs: &[LogEntry], path: &Path) -> Vec<csv::StringRecord> {
        let count = write_logs_csv(logs, path).unwrap();
        let mut reader = csv::Reader::from_path(path).unwrap();
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), count);
        rows
    }
}
