//! CSV and JSON export of result records.
//!
//! The CSV form is flat: per-race outcomes are written back as a canonical
//! results string (`"1-(3)-DNF-"`) so the file can be read back without
//! loss.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use crate::extract::results::{format_outcomes, format_points, parse_results};
use crate::types::ResultRecord;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File formats for exported results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// One CSV line
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    category: String,
    event_name: String,
    race_name: String,
    date: String,
    venue: Option<String>,
    position: Option<u32>,
    sail_number: Option<String>,
    boat_name: Option<String>,
    skipper: String,
    yacht_club: Option<String>,
    age_category: Option<String>,
    results: String,
    total_points: Option<String>,
    dnf: bool,
    dns: bool,
    dnc: bool,
}

impl From<&ResultRecord> for CsvRow {
    fn from(record: &ResultRecord) -> Self {
        Self {
            category: record.category.clone(),
            event_name: record.event_name.clone(),
            race_name: record.race_name.clone(),
            date: record.date.format(DATE_FORMAT).to_string(),
            venue: record.venue.clone(),
            position: record.position,
            sail_number: record.sail_number.clone(),
            boat_name: record.boat_name.clone(),
            skipper: record.skipper.clone(),
            yacht_club: record.yacht_club.clone(),
            age_category: record.age_category.clone(),
            results: format_outcomes(&record.outcomes),
            total_points: record.total_points.map(format_points),
            dnf: record.dnf,
            dns: record.dns,
            dnc: record.dnc,
        }
    }
}

impl TryFrom<CsvRow> for ResultRecord {
    type Error = anyhow::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let date = NaiveDateTime::parse_from_str(&row.date, DATE_FORMAT)
            .with_context(|| format!("invalid date {:?}", row.date))?;
        let total_points = match row.total_points.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(
                text.parse::<f64>()
                    .with_context(|| format!("invalid total_points {:?}", text))?,
            ),
        };

        Ok(ResultRecord {
            category: row.category,
            event_name: row.event_name,
            race_name: row.race_name,
            date,
            venue: row.venue,
            position: row.position,
            sail_number: row.sail_number,
            boat_name: row.boat_name,
            skipper: row.skipper,
            yacht_club: row.yacht_club,
            age_category: row.age_category,
            // Gaps are written as "?" and come back as the same gaps
            outcomes: parse_results(&row.results).outcomes,
            total_points,
            dnf: row.dnf,
            dns: row.dns,
            dnc: row.dnc,
        })
    }
}

/// Write records as CSV with a header row
pub fn write_csv<W: Write>(records: &[ResultRecord], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(CsvRow::from(record))?;
    }
    if records.is_empty() {
        csv.write_record(CSV_HEADER)?;
    }
    csv.flush()?;
    Ok(())
}

/// Header written for an empty export; serde writes it otherwise
const CSV_HEADER: [&str; 16] = [
    "category",
    "event_name",
    "race_name",
    "date",
    "venue",
    "position",
    "sail_number",
    "boat_name",
    "skipper",
    "yacht_club",
    "age_category",
    "results",
    "total_points",
    "dnf",
    "dns",
    "dnc",
];

/// Read records written by [`write_csv`]
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ResultRecord>> {
    let mut csv = csv::Reader::from_reader(reader);
    let headers = csv.headers()?.clone();
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        bail!("unexpected CSV header: {:?}", headers);
    }

    csv.deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            let row = row.with_context(|| format!("CSV line {}", i + 2))?;
            ResultRecord::try_from(row).with_context(|| format!("CSV line {}", i + 2))
        })
        .collect()
}

/// Write records as a pretty-printed JSON array
pub fn write_json<W: Write>(records: &[ResultRecord], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

/// Write records to `path`, creating parent directories
pub fn export_to_file(records: &[ResultRecord], path: &Path, format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);

    match format {
        ExportFormat::Csv => write_csv(records, writer),
        ExportFormat::Json => write_json(records, writer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RaceOutcome;
    use chrono::NaiveDate;

    fn create_test_record() -> ResultRecord {
        ResultRecord {
            category: "Sunfish".to_string(),
            event_name: "Harbor Cup, Day 1".to_string(),
            race_name: "Sunfish".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 6, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            venue: Some("Harbor YC".to_string()),
            position: Some(2),
            sail_number: Some("123".to_string()),
            boat_name: None,
            skipper: "Ann Lee".to_string(),
            yacht_club: None,
            age_category: Some("U19".to_string()),
            outcomes: vec![
                RaceOutcome::scored(1, 1.0),
                RaceOutcome {
                    discarded: true,
                    ..RaceOutcome::scored(2, 7.5)
                },
                RaceOutcome {
                    race_index: 4,
                    points: None,
                    dnf: false,
                    dns: false,
                    dnc: true,
                    discarded: false,
                },
            ],
            total_points: Some(8.5),
            dnf: false,
            dns: false,
            dnc: false,
        }
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&[create_test_record()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Sunfish,\"Harbor Cup, Day 1\",Sunfish,2023-06-10 00:00:00,Harbor YC,2,123,,Ann Lee,,U19,1-(7.5)-?-DNC-,8.5,false,false,false"
        );
    }

    #[test]
    fn test_csv_round_trip() {
        let dnf = ResultRecord {
            position: None,
            dnf: true,
            total_points: None,
            outcomes: vec![RaceOutcome {
                race_index: 1,
                points: None,
                dnf: true,
                dns: false,
                dnc: false,
                discarded: false,
            }],
            ..create_test_record()
        };
        let records = vec![create_test_record(), dnf];

        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();
        let parsed = read_csv(buf.as_slice()).unwrap();

        assert_eq!(parsed, records);
    }

    #[test]
    fn test_empty_csv_has_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        assert!(read_csv(buf.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_read_rejects_foreign_header() {
        let err = read_csv("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unexpected CSV header"));
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_json(&[create_test_record()], &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value[0]["skipper"], "Ann Lee");
        assert_eq!(value[0]["outcomes"][1]["discarded"], true);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/results.CSV")),
            Some(ExportFormat::Csv)
        );
        assert_eq!(ExportFormat::from_path(Path::new("results.txt")), None);
    }
}
