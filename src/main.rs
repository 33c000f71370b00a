use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};

mod aggregate;
mod cache;
mod classify;
mod complete;
mod grouping;
mod ingest;
mod models;
mod moving_average;
mod regression;
mod report;
mod schoolyear;
mod stats;

use models::{
    AggregationOptions, AttendanceRecord, Granularity, Metric, RegressionOptions,
};
use schoolyear::SchoolYear;

#[derive(Parser)]
#[command(name = "attendance-insights")]
#[command(about = "Attendance trend analytics for school administrators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-student attendance statistics for a date range
    #[command(group(
        ArgGroup::new("scope")
            .args(["class", "student"])
            .multiple(false)
    ))]
    Stats {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        student: Option<String>,
        /// Range start as DD.MM.YYYY (default: school year start)
        #[arg(long)]
        from: Option<String>,
        /// Range end as DD.MM.YYYY (default: school year end)
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = aggregate::DEFAULT_TRAILING_WEEKS)]
        trailing_weeks: u32,
        #[arg(long)]
        json: bool,
    },
    /// Period time series with a trailing moving average
    Trends {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = Granularity::Weekly)]
        granularity: Granularity,
        #[arg(long, value_enum, default_value_t = Metric::AbsenceTotal)]
        metric: Metric,
        #[arg(long, default_value_t = 3)]
        window: usize,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Least-squares trend fit over the period series
    Regression {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = Granularity::Weekly)]
        granularity: Granularity,
        #[arg(long, value_enum, default_value_t = Metric::AbsenceTotal)]
        metric: Metric,
        #[arg(long)]
        exclude_outliers: bool,
        /// Fit events per school day instead of absolute counts
        #[arg(long)]
        relative: bool,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["class", "student"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::Stats {
            csv,
            class,
            student,
            from,
            to,
            trailing_weeks,
            json,
        } => {
            let records = load_scoped(&csv, class.as_deref(), student.as_deref())?;
            let (range_start, range_end) = resolve_range(from.as_deref(), to.as_deref(), today)?;
            let entries = classify::classify_all(&records, today);
            let stats =
                aggregate::aggregate_students(&entries, range_start, range_end, trailing_weeks, today);
            let rows = report::export_rows(&stats);

            if rows.is_empty() {
                println!("No attendance events found for this window.");
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!(
                        "- {}, {} ({}): tardiness {}/{}/{} absence {}/{}/{} (excused/unexcused/pending), year unexcused {}+{}, last weeks unexcused {}+{}",
                        row.surname,
                        row.given_name,
                        row.class,
                        row.tardiness_excused,
                        row.tardiness_unexcused,
                        row.tardiness_pending,
                        row.absence_excused,
                        row.absence_unexcused,
                        row.absence_pending,
                        row.year_unexcused_tardiness,
                        row.year_unexcused_absence,
                        row.recent_unexcused_tardiness,
                        row.recent_unexcused_absence,
                    );
                }
            }
        }
        Commands::Trends {
            csv,
            granularity,
            metric,
            window,
            from,
            to,
            json,
        } => {
            let records = load_scoped(&csv, None, None)?;
            let (range_start, range_end) = resolve_range(from.as_deref(), to.as_deref(), today)?;
            let entries = classify::classify_all(&records, today);
            let buckets = grouping::group_by_period(
                &entries,
                AggregationOptions {
                    granularity,
                    range_start,
                    range_end,
                },
            );
            let buckets = complete::complete_series(&buckets, granularity);
            let points = moving_average::moving_average(&buckets, window, metric);

            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else if points.is_empty() {
                println!("No attendance events found for this window.");
            } else {
                for point in &points {
                    let value = point.value.unwrap_or_default();
                    match point.moving_average {
                        Some(avg) => {
                            println!(
                                "- {}: {value:.0} (moving average {avg:.2}){}",
                                point.label,
                                if point.is_outlier { " [outlier]" } else { "" }
                            );
                        }
                        None => println!("- {}: {value:.0}", point.label),
                    }
                }
            }
        }
        Commands::Regression {
            csv,
            granularity,
            metric,
            exclude_outliers,
            relative,
            from,
            to,
            json,
        } => {
            let records = load_scoped(&csv, None, None)?;
            let (range_start, range_end) = resolve_range(from.as_deref(), to.as_deref(), today)?;
            let entries = classify::classify_all(&records, today);
            let buckets = grouping::group_by_period(
                &entries,
                AggregationOptions {
                    granularity,
                    range_start,
                    range_end,
                },
            );
            let buckets = complete::complete_series(&buckets, granularity);
            let (points, outcome) = regression::fit_trend(
                &buckets,
                metric,
                granularity,
                RegressionOptions {
                    exclude_outliers,
                    use_relative_values: relative,
                },
            );

            if json {
                let payload = serde_json::json!({
                    "series": points,
                    "regression": outcome,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Trend: {}", outcome.trend);
                println!(
                    "Slope {:.3} per period, intercept {:.3}, R² {:.2}",
                    outcome.slope, outcome.intercept, outcome.r_squared
                );
                if let Some(prediction) = outcome.prediction {
                    println!("Next period estimate: {prediction:.1}");
                }
                if !outcome.outlier_indices.is_empty() {
                    let labels: Vec<&str> = outcome
                        .outlier_indices
                        .iter()
                        .filter_map(|&i| points.get(i).map(|p| p.label.as_str()))
                        .collect();
                    println!("Outlier periods: {}", labels.join(", "));
                }
            }
        }
        Commands::Report {
            csv,
            class,
            student,
            from,
            to,
            out,
        } => {
            let records = load_scoped(&csv, class.as_deref(), student.as_deref())?;
            let (range_start, range_end) = resolve_range(from.as_deref(), to.as_deref(), today)?;
            let entries = classify::classify_all(&records, today);

            // one cache per loaded dataset; a reused cache would need reset() here
            let analytics_cache = cache::AnalyticsCache::new();
            let averages = analytics_cache.system_averages(&entries);
            let student_count = analytics_cache.student_count(&entries);

            let stats = aggregate::aggregate_students(
                &entries,
                range_start,
                range_end,
                aggregate::DEFAULT_TRAILING_WEEKS,
                today,
            );
            let buckets = grouping::group_by_period(
                &entries,
                AggregationOptions {
                    granularity: Granularity::Weekly,
                    range_start,
                    range_end,
                },
            );
            let buckets = complete::complete_series(&buckets, Granularity::Weekly);
            let (mut points, outcome) = regression::fit_trend(
                &buckets,
                Metric::AbsenceTotal,
                Granularity::Weekly,
                RegressionOptions::default(),
            );
            let averaged = moving_average::moving_average(&buckets, 3, Metric::AbsenceTotal);
            for (point, avg) in points.iter_mut().zip(&averaged) {
                point.moving_average = avg.moving_average;
            }

            let scope_label = class.as_deref().or(student.as_deref());
            let rendered = report::build_report(
                scope_label,
                range_start,
                range_end,
                &stats,
                &points,
                &outcome,
                averages,
                student_count,
            );
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_scoped(
    csv: &std::path::Path,
    class: Option<&str>,
    student: Option<&str>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut records = ingest::load_records(csv)?;
    records.retain(|record| matches_scope(record, class, student));
    Ok(records)
}

fn matches_scope(record: &AttendanceRecord, class: Option<&str>, student: Option<&str>) -> bool {
    if let Some(class) = class {
        return record.class.eq_ignore_ascii_case(class);
    }
    if let Some(student) = student {
        return record.surname.eq_ignore_ascii_case(student);
    }
    true
}

/// Selected range, defaulting to the school year `today` falls into.
fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let year = SchoolYear::containing(today);
    let start = match from {
        Some(text) => ingest::parse_date(text)
            .with_context(|| format!("invalid --from date '{text}', expected DD.MM.YYYY"))?,
        None => year.start,
    };
    let end = match to {
        Some(text) => ingest::parse_date(text)
            .with_context(|| format!("invalid --to date '{text}', expected DD.MM.YYYY"))?,
        None => year.end,
    };
    Ok((start, end))
}
