use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::cache::SystemAverages;
use crate::models::{
    RegressionOutcome, StudentExportRow, StudentKey, StudentPeriodStats, TrendPoint,
};

/// Flatten per-student stats into export rows. The map is keyed by surname
/// then given name, so iteration order already is the required enumeration
/// order; values are passed through without any rounding or formatting.
pub fn export_rows(stats: &BTreeMap<StudentKey, StudentPeriodStats>) -> Vec<StudentExportRow> {
    stats
        .values()
        .map(|s| StudentExportRow {
            surname: s.surname.clone(),
            given_name: s.given_name.clone(),
            class: s.class.clone(),
            tardiness_excused: s.tardiness.excused,
            tardiness_unexcused: s.tardiness.unexcused,
            tardiness_pending: s.tardiness.pending,
            absence_excused: s.absence.excused,
            absence_unexcused: s.absence.unexcused,
            absence_pending: s.absence.pending,
            year_unexcused_tardiness: s.year_unexcused_tardiness,
            year_unexcused_absence: s.year_unexcused_absence,
            year_total_absence: s.year_total_absence,
            recent_unexcused_tardiness: s.recent_unexcused_tardiness,
            recent_unexcused_absence: s.recent_unexcused_absence,
        })
        .collect()
}

pub fn build_report(
    scope: Option<&str>,
    range_start: NaiveDate,
    range_end: NaiveDate,
    stats: &BTreeMap<StudentKey, StudentPeriodStats>,
    trend: &[TrendPoint],
    regression: &RegressionOutcome,
    averages: SystemAverages,
    student_count: usize,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all classes");

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} to {})",
        scope_label,
        range_start.format("%d.%m.%Y"),
        range_end.format("%d.%m.%Y")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Unexcused Events");

    let mut ranked: Vec<&StudentPeriodStats> = stats.values().collect();
    ranked.sort_by(|a, b| {
        let a_total = a.tardiness.unexcused + a.absence.unexcused;
        let b_total = b.tardiness.unexcused + b.absence.unexcused;
        b_total.cmp(&a_total).then(a.surname.cmp(&b.surname))
    });

    if ranked.is_empty() {
        let _ = writeln!(output, "No attendance events recorded for this window.");
    } else {
        for student in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}, {} ({}): {} unexcused tardiness, {} unexcused absence days, {} absence days total",
                student.surname,
                student.given_name,
                student.class,
                student.tardiness.unexcused,
                student.absence.unexcused,
                student.absence.total(),
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Period Trend");

    if trend.is_empty() {
        let _ = writeln!(output, "Not enough data for a period series.");
    } else {
        for point in trend {
            let mut line = format!("- {}", point.label);
            match point.value {
                Some(value) => {
                    let _ = write!(line, ": {value:.1}");
                }
                None => {
                    if let Some(prediction) = regression.prediction.filter(|_| point.is_prediction)
                    {
                        let _ = write!(line, ": {prediction:.1} (predicted)");
                    }
                }
            }
            if let Some(average) = point.moving_average {
                let _ = write!(line, " (moving average {average:.1})");
            }
            if point.is_outlier {
                let _ = write!(line, " [outlier]");
            }
            let _ = writeln!(output, "{line}");
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "Trend: {}", regression.trend);
        let _ = writeln!(
            output,
            "Slope {:.3} per period, R² {:.2}",
            regression.slope, regression.r_squared
        );
        if let Some(prediction) = regression.prediction {
            let _ = writeln!(output, "Next period estimate: {prediction:.1}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Above the School Average");
    let _ = writeln!(
        output,
        "School-wide: {:.1} tardiness and {:.1} absence days per student ({student_count} students).",
        averages.tardiness_per_student, averages.absences_per_student
    );

    let above: Vec<&StudentPeriodStats> = ranked
        .iter()
        .copied()
        .filter(|s| {
            f64::from(s.tardiness.total()) > averages.tardiness_per_student
                || f64::from(s.absence.total()) > averages.absences_per_student
        })
        .collect();

    if above.is_empty() {
        let _ = writeln!(output, "No student is above the school average.");
    } else {
        for student in above.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}, {} ({}): {} tardiness, {} absence days",
                student.surname,
                student.given_name,
                student.class,
                student.tardiness.total(),
                student.absence.total(),
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryCounts;

    fn student(surname: &str, unexcused_tardiness: u32, absences: u32) -> StudentPeriodStats {
        StudentPeriodStats {
            surname: surname.to_string(),
            given_name: "Lena".to_string(),
            class: "8b".to_string(),
            tardiness: CategoryCounts {
                excused: 0,
                unexcused: unexcused_tardiness,
                pending: 0,
            },
            absence: CategoryCounts {
                excused: absences,
                unexcused: 0,
                pending: 0,
            },
            ..Default::default()
        }
    }

    fn stats_map(students: Vec<StudentPeriodStats>) -> BTreeMap<StudentKey, StudentPeriodStats> {
        students
            .into_iter()
            .map(|s| {
                (
                    StudentKey {
                        surname: s.surname.clone(),
                        given_name: s.given_name.clone(),
                    },
                    s,
                )
            })
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn export_rows_follow_surname_order() {
        let stats = stats_map(vec![student("Weber", 1, 0), student("Brandt", 2, 1)]);
        let rows = export_rows(&stats);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].surname, "Brandt");
        assert_eq!(rows[1].surname, "Weber");
        assert_eq!(rows[0].tardiness_unexcused, 2);
        assert_eq!(rows[0].absence_excused, 1);
    }

    #[test]
    fn report_ranks_students_by_unexcused_events() {
        let stats = stats_map(vec![student("Brandt", 1, 0), student("Weber", 4, 0)]);
        let report = build_report(
            Some("8b"),
            date(2024, 9, 1),
            date(2024, 12, 20),
            &stats,
            &[],
            &RegressionOutcome::insufficient(),
            SystemAverages {
                tardiness_per_student: 2.0,
                absences_per_student: 0.5,
            },
            2,
        );

        let weber = report.find("Weber").unwrap();
        let brandt = report.find("Brandt").unwrap();
        assert!(weber < brandt);
        assert!(report.contains("Generated for 8b"));
        assert!(report.contains("Not enough data for a period series."));
    }

    #[test]
    fn empty_dataset_renders_placeholder_sections() {
        let report = build_report(
            None,
            date(2024, 9, 1),
            date(2024, 12, 20),
            &BTreeMap::new(),
            &[],
            &RegressionOutcome::insufficient(),
            SystemAverages {
                tardiness_per_student: 0.0,
                absences_per_student: 0.0,
            },
            0,
        );

        assert!(report.contains("all classes"));
        assert!(report.contains("No attendance events recorded for this window."));
        assert!(report.contains("No student is above the school average."));
    }
}
