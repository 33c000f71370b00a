use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub surname: String,
    pub given_name: String,
    pub class: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub begin_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StudentKey {
    pub surname: String,
    pub given_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventCategory {
    Tardiness,
    Absence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExcuseOutcome {
    Excused,
    Unexcused,
    Pending,
}

/// One classified attendance event covering a single calendar day.
/// Multi-day records expand into one entry per covered day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEntry {
    pub surname: String,
    pub given_name: String,
    pub class: String,
    pub date: NaiveDate,
    pub category: EventCategory,
    pub outcome: ExcuseOutcome,
    pub begin_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: String,
    pub raw_status: String,
}

impl ClassifiedEntry {
    pub fn student_key(&self) -> StudentKey {
        StudentKey {
            surname: self.surname.clone(),
            given_name: self.given_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryCounts {
    pub excused: u32,
    pub unexcused: u32,
    pub pending: u32,
}

impl CategoryCounts {
    pub fn bump(&mut self, outcome: ExcuseOutcome) {
        match outcome {
            ExcuseOutcome::Excused => self.excused += 1,
            ExcuseOutcome::Unexcused => self.unexcused += 1,
            ExcuseOutcome::Pending => self.pending += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.excused + self.unexcused + self.pending
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentPeriodStats {
    pub surname: String,
    pub given_name: String,
    pub class: String,
    pub tardiness: CategoryCounts,
    pub absence: CategoryCounts,
    pub tardiness_entries: Vec<ClassifiedEntry>,
    pub absence_entries: Vec<ClassifiedEntry>,
    pub year_unexcused_tardiness: u32,
    pub year_unexcused_absence: u32,
    pub year_total_absence: u32,
    pub recent_unexcused_tardiness: u32,
    pub recent_unexcused_absence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

/// Which bucket counter a statistic runs over. Replaces the upstream habit of
/// reading field names off point objects by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Metric {
    Tardiness,
    AbsenceExcused,
    AbsenceUnexcused,
    AbsenceTotal,
}

/// One aggregated time-series data point (a day, week or month).
#[derive(Debug, Clone, Serialize)]
pub struct PeriodBucket {
    pub label: String,
    pub tardiness: u32,
    pub absence_excused: u32,
    pub absence_unexcused: u32,
    pub absence_total: u32,
    /// Encodes school-year chronological order across the September
    /// boundary; see `schoolyear`.
    pub sort_key: i32,
    pub date_range: Option<String>,
}

impl PeriodBucket {
    pub fn empty(label: String, sort_key: i32) -> Self {
        Self {
            label,
            tardiness: 0,
            absence_excused: 0,
            absence_unexcused: 0,
            absence_total: 0,
            sort_key,
            date_range: None,
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        let raw = match metric {
            Metric::Tardiness => self.tardiness,
            Metric::AbsenceExcused => self.absence_excused,
            Metric::AbsenceUnexcused => self.absence_unexcused,
            Metric::AbsenceTotal => self.absence_total,
        };
        f64::from(raw)
    }

    pub fn combined_total(&self) -> u32 {
        self.tardiness + self.absence_total
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregationOptions {
    pub granularity: Granularity,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionOptions {
    pub exclude_outliers: bool,
    pub use_relative_values: bool,
}

/// A period bucket enriched with analytics flags, as handed to charts.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub value: Option<f64>,
    pub moving_average: Option<f64>,
    pub is_outlier: bool,
    pub is_prediction: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionOutcome {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub trend: String,
    pub prediction: Option<f64>,
    pub outlier_indices: Vec<usize>,
}

impl RegressionOutcome {
    pub fn insufficient() -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            trend: "unknown (too few data points)".to_string(),
            prediction: None,
            outlier_indices: Vec::new(),
        }
    }
}

/// Flat per-student row for spreadsheet/PDF export collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct StudentExportRow {
    pub surname: String,
    pub given_name: String,
    pub class: String,
    pub tardiness_excused: u32,
    pub tardiness_unexcused: u32,
    pub tardiness_pending: u32,
    pub absence_excused: u32,
    pub absence_unexcused: u32,
    pub absence_pending: u32,
    pub year_unexcused_tardiness: u32,
    pub year_unexcused_absence: u32,
    pub year_total_absence: u32,
    pub recent_unexcused_tardiness: u32,
    pub recent_unexcused_absence: u32,
}
