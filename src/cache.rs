use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::models::{ClassifiedEntry, EventCategory};

/// System-wide per-student averages used for "compared to the whole school"
/// lines in reports and tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemAverages {
    pub tardiness_per_student: f64,
    pub absences_per_student: f64,
}

/// Memoized aggregate totals. Repeated renders must compare against the
/// same baseline, so the first computation wins until `reset` is called.
/// The host must call `reset` whenever a new dataset is loaded; a stale
/// cache would silently mix totals from two uploads.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    inner: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    averages: Option<SystemAverages>,
    student_count: Option<usize>,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all cached totals. The only invalidation event is loading a new
    /// dataset.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = CacheState::default();
    }

    pub fn system_averages(&self, entries: &[ClassifiedEntry]) -> SystemAverages {
        let mut state = self.lock();
        if let Some(cached) = state.averages {
            return cached;
        }

        let students = count_students(entries);
        let averages = if students == 0 {
            SystemAverages {
                tardiness_per_student: 0.0,
                absences_per_student: 0.0,
            }
        } else {
            let tardiness = entries
                .iter()
                .filter(|e| e.category == EventCategory::Tardiness)
                .count();
            let absences = entries
                .iter()
                .filter(|e| e.category == EventCategory::Absence)
                .count();
            SystemAverages {
                tardiness_per_student: tardiness as f64 / students as f64,
                absences_per_student: absences as f64 / students as f64,
            }
        };

        state.averages = Some(averages);
        state.student_count = Some(students);
        averages
    }

    pub fn student_count(&self, entries: &[ClassifiedEntry]) -> usize {
        let mut state = self.lock();
        if let Some(cached) = state.student_count {
            return cached;
        }
        let students = count_students(entries);
        state.student_count = Some(students);
        students
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn count_students(entries: &[ClassifiedEntry]) -> usize {
    entries
        .iter()
        .map(|e| (e.surname.as_str(), e.given_name.as_str()))
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExcuseOutcome;
    use chrono::NaiveDate;

    fn entry(surname: &str, category: EventCategory) -> ClassifiedEntry {
        ClassifiedEntry {
            surname: surname.to_string(),
            given_name: "Lena".to_string(),
            class: "8b".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            category,
            outcome: ExcuseOutcome::Excused,
            begin_time: None,
            end_time: None,
            reason: String::new(),
            raw_status: String::new(),
        }
    }

    #[test]
    fn averages_split_totals_over_distinct_students() {
        let cache = AnalyticsCache::new();
        let entries = vec![
            entry("Brandt", EventCategory::Tardiness),
            entry("Brandt", EventCategory::Absence),
            entry("Weber", EventCategory::Absence),
        ];

        let averages = cache.system_averages(&entries);
        assert_eq!(averages.tardiness_per_student, 0.5);
        assert_eq!(averages.absences_per_student, 1.0);
        assert_eq!(cache.student_count(&entries), 2);
    }

    #[test]
    fn first_computation_sticks_until_reset() {
        let cache = AnalyticsCache::new();
        let first = vec![entry("Brandt", EventCategory::Tardiness)];
        let second = vec![
            entry("Brandt", EventCategory::Tardiness),
            entry("Weber", EventCategory::Tardiness),
            entry("Weber", EventCategory::Tardiness),
        ];

        let baseline = cache.system_averages(&first);
        assert_eq!(baseline.tardiness_per_student, 1.0);

        // a different slice must not shift the cached baseline
        let repeated = cache.system_averages(&second);
        assert_eq!(repeated, baseline);

        cache.reset();
        let fresh = cache.system_averages(&second);
        assert_eq!(fresh.tardiness_per_student, 1.5);
    }

    #[test]
    fn empty_dataset_yields_zero_averages() {
        let cache = AnalyticsCache::new();
        let averages = cache.system_averages(&[]);
        assert_eq!(averages.tardiness_per_student, 0.0);
        assert_eq!(averages.absences_per_student, 0.0);
        assert_eq!(cache.student_count(&[]), 0);
    }
}
