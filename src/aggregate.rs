use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{
    ClassifiedEntry, EventCategory, ExcuseOutcome, StudentKey, StudentPeriodStats,
};
use crate::schoolyear::{trailing_completed_weeks, SchoolYear};

pub const DEFAULT_TRAILING_WEEKS: u32 = 4;

/// Fold classified entries into per-student counters for the selected range,
/// plus the school-year-to-date and trailing-week auxiliaries. Every student
/// with any entry at all appears in the result, so tables stay consistent
/// across sub-ranges. Keyed by surname then given name, which is also the
/// export enumeration order.
pub fn aggregate_students(
    entries: &[ClassifiedEntry],
    range_start: NaiveDate,
    range_end: NaiveDate,
    trailing_weeks: u32,
    today: NaiveDate,
) -> BTreeMap<StudentKey, StudentPeriodStats> {
    let year = SchoolYear::containing(today);
    let (recent_start, recent_end) = trailing_completed_weeks(today, trailing_weeks);

    let mut stats: BTreeMap<StudentKey, StudentPeriodStats> = BTreeMap::new();

    for entry in entries {
        let slot = stats
            .entry(entry.student_key())
            .or_insert_with(|| StudentPeriodStats {
                surname: entry.surname.clone(),
                given_name: entry.given_name.clone(),
                class: entry.class.clone(),
                ..Default::default()
            });

        if entry.date >= range_start && entry.date <= range_end {
            match entry.category {
                EventCategory::Tardiness => {
                    slot.tardiness.bump(entry.outcome);
                    slot.tardiness_entries.push(entry.clone());
                }
                EventCategory::Absence => {
                    slot.absence.bump(entry.outcome);
                    slot.absence_entries.push(entry.clone());
                }
            }
        }

        if year.contains(entry.date) {
            match entry.category {
                EventCategory::Tardiness => {
                    if entry.outcome == ExcuseOutcome::Unexcused {
                        slot.year_unexcused_tardiness += 1;
                    }
                }
                EventCategory::Absence => {
                    slot.year_total_absence += 1;
                    if entry.outcome == ExcuseOutcome::Unexcused {
                        slot.year_unexcused_absence += 1;
                    }
                }
            }
        }

        if entry.date >= recent_start
            && entry.date <= recent_end
            && entry.outcome == ExcuseOutcome::Unexcused
        {
            match entry.category {
                EventCategory::Tardiness => slot.recent_unexcused_tardiness += 1,
                EventCategory::Absence => slot.recent_unexcused_absence += 1,
            }
        }
    }

    stats
}
