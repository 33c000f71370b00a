use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::models::{AttendanceRecord, ClassifiedEntry, EventCategory, ExcuseOutcome};

/// Reason markers flagging a mistyped row that must be ignored entirely.
const ERRONEOUS_MARKERS: [&str; 2] = ["fehleintrag", "irrtümlich"];

/// Reason text identifying an explicit tardiness entry.
const TARDINESS_MARKER: &str = "verspätung";

const UNEXCUSED_STATUS: &str = "unentschuldigt";

/// Status values counting as excused, medical certificates included.
const EXCUSED_STATUSES: [&str; 3] = ["entschuldigt", "attest", "ärztliches attest"];

/// Lesson-end bell times. An entry ending exactly on one of these covered a
/// whole lesson and is an absence, not a late arrival.
const STANDARD_LESSON_END_TIMES: [&str; 5] = ["11:35", "12:35", "13:20", "15:10", "16:00"];

pub const EXCUSE_DEADLINE_DAYS: i64 = 7;

/// Classify every record, dropping the malformed ones. `today` drives the
/// excuse deadline, so the same record set can classify differently on a
/// later day.
pub fn classify_all(records: &[AttendanceRecord], today: NaiveDate) -> Vec<ClassifiedEntry> {
    records
        .iter()
        .flat_map(|record| classify_record(record, today))
        .collect()
}

/// Expand one raw record into per-day classified entries. Returns an empty
/// list for rows missing the student name or start date, and for rows whose
/// reason marks them as erroneous.
pub fn classify_record(record: &AttendanceRecord, today: NaiveDate) -> Vec<ClassifiedEntry> {
    if record.surname.trim().is_empty() && record.given_name.trim().is_empty() {
        debug!("dropping record without student name");
        return Vec::new();
    }
    let Some(start) = record.start_date else {
        debug!(
            surname = %record.surname,
            "dropping record without start date"
        );
        return Vec::new();
    };
    if is_erroneous(&record.reason) {
        debug!(surname = %record.surname, reason = %record.reason, "dropping erroneous entry");
        return Vec::new();
    }

    match record.end_date {
        Some(end) if end != start => {
            let last = end.max(start);
            let mut day = start.min(end);
            let mut entries = Vec::new();
            while day <= last {
                entries.push(build_entry(record, day, EventCategory::Absence, today));
                day += Duration::days(1);
            }
            entries
        }
        _ => {
            let category = single_day_category(record);
            vec![build_entry(record, start, category, today)]
        }
    }
}

fn build_entry(
    record: &AttendanceRecord,
    date: NaiveDate,
    category: EventCategory,
    today: NaiveDate,
) -> ClassifiedEntry {
    ClassifiedEntry {
        surname: record.surname.clone(),
        given_name: record.given_name.clone(),
        class: record.class.clone(),
        date,
        category,
        outcome: excuse_outcome(&record.status, date, today),
        begin_time: record.begin_time,
        end_time: record.end_time,
        reason: record.reason.clone(),
        raw_status: record.status.clone(),
    }
}

/// The excuse outcome for an entry on `entry_date`, evaluated as of `today`.
/// An empty status stays pending until the seven-day excuse window has
/// elapsed; the deadline day itself already counts as overdue.
pub fn excuse_outcome(status: &str, entry_date: NaiveDate, today: NaiveDate) -> ExcuseOutcome {
    let status = status.trim().to_lowercase();
    if status.starts_with(UNEXCUSED_STATUS) {
        return ExcuseOutcome::Unexcused;
    }
    if EXCUSED_STATUSES.iter().any(|known| status == *known) || status.contains("attest") {
        return ExcuseOutcome::Excused;
    }

    let deadline = entry_date + Duration::days(EXCUSE_DEADLINE_DAYS);
    if today >= deadline {
        ExcuseOutcome::Unexcused
    } else {
        ExcuseOutcome::Pending
    }
}

fn is_erroneous(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    ERRONEOUS_MARKERS.iter().any(|marker| reason.contains(marker))
}

/// Tardiness detection applies to single-day records only. An explicit
/// non-tardiness reason or an entry running to the end of a lesson is an
/// absence; a missing end time without a reason stays an absence as well.
fn single_day_category(record: &AttendanceRecord) -> EventCategory {
    let reason = record.reason.trim().to_lowercase();
    if !reason.is_empty() {
        return if reason == TARDINESS_MARKER {
            EventCategory::Tardiness
        } else {
            EventCategory::Absence
        };
    }

    match record.end_time {
        Some(end) if !is_standard_lesson_end(end) => EventCategory::Tardiness,
        _ => EventCategory::Absence,
    }
}

fn is_standard_lesson_end(time: NaiveTime) -> bool {
    let formatted = time.format("%H:%M").to_string();
    STANDARD_LESSON_END_TIMES.iter().any(|t| *t == formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_record(start: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            surname: "Brandt".to_string(),
            given_name: "Lena".to_string(),
            class: "8b".to_string(),
            start_date: Some(start),
            end_date: None,
            begin_time: None,
            end_time: None,
            status: String::new(),
            reason: String::new(),
        }
    }

    #[test]
    fn multi_day_span_expands_to_one_absence_per_day() {
        let mut record = sample_record(date(2024, 9, 1));
        record.end_date = Some(date(2024, 9, 3));

        let entries = classify_record(&record, date(2024, 9, 20));
        assert_eq!(entries.len(), 3);
        for (offset, entry) in entries.iter().enumerate() {
            assert_eq!(entry.date, date(2024, 9, 1 + offset as u32));
            assert_eq!(entry.category, EventCategory::Absence);
        }
    }

    #[test]
    fn deadline_boundary_is_exactly_seven_days() {
        let today = date(2024, 10, 15);
        assert_eq!(
            excuse_outcome("", date(2024, 10, 8), today),
            ExcuseOutcome::Unexcused
        );
        assert_eq!(
            excuse_outcome("", date(2024, 10, 9), today),
            ExcuseOutcome::Pending
        );
    }

    #[test]
    fn outcome_flips_once_today_crosses_the_deadline() {
        let record = sample_record(date(2024, 10, 1));

        let before = classify_record(&record, date(2024, 10, 5));
        assert_eq!(before[0].outcome, ExcuseOutcome::Pending);

        let after = classify_record(&record, date(2024, 10, 9));
        assert_eq!(after[0].outcome, ExcuseOutcome::Unexcused);
    }

    #[test]
    fn explicit_statuses_override_the_deadline() {
        let today = date(2024, 12, 1);
        assert_eq!(
            excuse_outcome("unentschuldigt", date(2024, 11, 30), today),
            ExcuseOutcome::Unexcused
        );
        assert_eq!(
            excuse_outcome("entschuldigt", date(2024, 10, 1), today),
            ExcuseOutcome::Excused
        );
        assert_eq!(
            excuse_outcome("Ärztliches Attest", date(2024, 10, 1), today),
            ExcuseOutcome::Excused
        );
    }

    #[test]
    fn tardiness_requires_an_off_schedule_end_time() {
        let mut record = sample_record(date(2024, 11, 4));
        record.end_time = Some(time(9, 40));
        let entries = classify_record(&record, date(2024, 11, 4));
        assert_eq!(entries[0].category, EventCategory::Tardiness);

        record.end_time = Some(time(13, 20));
        let entries = classify_record(&record, date(2024, 11, 4));
        assert_eq!(entries[0].category, EventCategory::Absence);

        record.end_time = None;
        let entries = classify_record(&record, date(2024, 11, 4));
        assert_eq!(entries[0].category, EventCategory::Absence);
    }

    #[test]
    fn reason_text_decides_the_category() {
        let mut record = sample_record(date(2024, 11, 4));
        record.reason = "Verspätung".to_string();
        let entries = classify_record(&record, date(2024, 11, 4));
        assert_eq!(entries[0].category, EventCategory::Tardiness);

        record.reason = "Arzttermin".to_string();
        let entries = classify_record(&record, date(2024, 11, 4));
        assert_eq!(entries[0].category, EventCategory::Absence);
    }

    #[test]
    fn erroneous_and_incomplete_rows_are_dropped() {
        let mut record = sample_record(date(2024, 11, 4));
        record.reason = "Fehleintrag, bitte ignorieren".to_string();
        assert!(classify_record(&record, date(2024, 11, 4)).is_empty());

        let mut record = sample_record(date(2024, 11, 4));
        record.surname = String::new();
        record.given_name = String::new();
        assert!(classify_record(&record, date(2024, 11, 4)).is_empty());

        let mut record = sample_record(date(2024, 11, 4));
        record.start_date = None;
        assert!(classify_record(&record, date(2024, 11, 4)).is_empty());
    }

    #[test]
    fn classification_is_deterministic_for_a_fixed_day() {
        let mut record = sample_record(date(2024, 10, 1));
        record.end_date = Some(date(2024, 10, 4));
        let today = date(2024, 10, 10);

        let first = classify_record(&record, today);
        let second = classify_record(&record, today);
        assert_eq!(first, second);
    }
}
