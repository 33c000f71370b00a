use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::warn;

use crate::models::AttendanceRecord;

/// Raw CSV row as exported by the school administration software. Column
/// names are the German domain terms; dates are `DD.MM.YYYY`, times `HH:MM`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Name", default)]
    surname: String,
    #[serde(rename = "Vorname", default)]
    given_name: String,
    #[serde(rename = "Klasse", default)]
    class: String,
    #[serde(rename = "Beginndatum", default)]
    start_date: String,
    #[serde(rename = "Endedatum", default)]
    end_date: String,
    #[serde(rename = "Beginnzeit", default)]
    begin_time: String,
    #[serde(rename = "Endezeit", default)]
    end_time: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Grund", default)]
    reason: String,
}

impl CsvRow {
    fn into_record(self) -> AttendanceRecord {
        if !self.start_date.trim().is_empty() && parse_date(&self.start_date).is_none() {
            warn!(
                surname = %self.surname,
                raw = %self.start_date,
                "unparsable start date, record will be dropped"
            );
        }

        AttendanceRecord {
            start_date: parse_date(&self.start_date),
            end_date: parse_date(&self.end_date),
            begin_time: parse_time(&self.begin_time),
            end_time: parse_time(&self.end_time),
            surname: self.surname,
            given_name: self.given_name,
            class: self.class,
            status: self.status,
            reason: self.reason,
        }
    }
}

/// Read raw attendance records from a CSV export. Rows the CSV reader cannot
/// decode are skipped with a warning; bad dates inside otherwise readable
/// rows survive as `None` and get dropped during classification.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<AttendanceRecord>> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(read_records(reader))
}

fn read_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Vec<AttendanceRecord> {
    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        match result {
            Ok(row) => records.push(row.into_record()),
            Err(err) => {
                warn!(row = index + 1, error = %err, "skipping unreadable row");
            }
        }
    }
    records
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%d.%m.%Y").ok()
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(text, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_csv(data: &str) -> Vec<AttendanceRecord> {
        read_records(csv::Reader::from_reader(data.as_bytes()))
    }

    #[test]
    fn parses_german_dates_and_times() {
        assert_eq!(
            parse_date("16.09.2024"),
            NaiveDate::from_ymd_opt(2024, 9, 16)
        );
        assert_eq!(parse_date(" 01.02.2025 "), NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(parse_date("2024-09-16"), None);
        assert_eq!(parse_date(""), None);

        assert_eq!(parse_time("07:45"), NaiveTime::from_hms_opt(7, 45, 0));
        assert_eq!(parse_time("nachmittags"), None);
    }

    #[test]
    fn reads_rows_with_german_headers() {
        let data = "\
Name,Vorname,Klasse,Beginndatum,Endedatum,Beginnzeit,Endezeit,Status,Grund
Brandt,Lena,8b,16.09.2024,,07:50,08:35,,Verspätung
Weber,Jonas,8b,17.09.2024,19.09.2024,,,entschuldigt,Krankheit
";
        let records = read_csv(data);
        assert_eq!(records.len(), 2);

        let brandt = &records[0];
        assert_eq!(brandt.surname, "Brandt");
        assert_eq!(brandt.start_date, NaiveDate::from_ymd_opt(2024, 9, 16));
        assert_eq!(brandt.end_date, None);
        assert_eq!(brandt.end_time, NaiveTime::from_hms_opt(8, 35, 0));
        assert_eq!(brandt.reason, "Verspätung");

        let weber = &records[1];
        assert_eq!(weber.end_date, NaiveDate::from_ymd_opt(2024, 9, 19));
        assert_eq!(weber.status, "entschuldigt");
    }

    #[test]
    fn bad_dates_survive_as_none() {
        let data = "\
Name,Vorname,Klasse,Beginndatum,Endedatum,Beginnzeit,Endezeit,Status,Grund
Brandt,Lena,8b,16/09/2024,,,,,
";
        let records = read_csv(data);
        assert_eq!(records.len(), 1);
        assert!(records[0].start_date.is_none());
    }

    #[test]
    fn missing_optional_columns_default_to_empty() {
        let data = "\
Name,Vorname,Beginndatum
Brandt,Lena,16.09.2024
";
        let records = read_csv(data);
        assert_eq!(records.len(), 1);
        assert!(records[0].class.is_empty());
        assert!(records[0].status.is_empty());
    }
}
