use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::models::{
    AggregationOptions, ClassifiedEntry, EventCategory, ExcuseOutcome, Granularity, PeriodBucket,
};
use crate::schoolyear::{month_label, month_sort_key, week_sort_key};

/// Group classified entries into period buckets. Buckets carry school-year
/// sort keys so a series starting in September orders correctly across the
/// January wrap.
pub fn group_by_period(
    entries: &[ClassifiedEntry],
    options: AggregationOptions,
) -> Vec<PeriodBucket> {
    let mut buckets: HashMap<String, PeriodBucket> = HashMap::new();
    let mut spans: HashMap<String, (NaiveDate, NaiveDate)> = HashMap::new();

    for entry in entries {
        if entry.date < options.range_start || entry.date > options.range_end {
            continue;
        }

        let (label, sort_key) = period_of(entry.date, options.granularity);
        let bucket = buckets
            .entry(label.clone())
            .or_insert_with(|| PeriodBucket::empty(label.clone(), sort_key));
        apply_entry(bucket, entry);

        spans
            .entry(label)
            .and_modify(|(first, last)| {
                *first = (*first).min(entry.date);
                *last = (*last).max(entry.date);
            })
            .or_insert((entry.date, entry.date));
    }

    let mut result: Vec<PeriodBucket> = buckets
        .into_iter()
        .map(|(label, mut bucket)| {
            if let Some((first, last)) = spans.get(&label) {
                bucket.date_range = Some(format_span(*first, *last));
            }
            bucket
        })
        .collect();

    result.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then(a.label.cmp(&b.label)));
    result
}

/// Label and school-year sort key for the period containing `date`.
pub fn period_of(date: NaiveDate, granularity: Granularity) -> (String, i32) {
    match granularity {
        Granularity::Daily => (
            date.format("%d.%m.%Y").to_string(),
            date.num_days_from_ce(),
        ),
        Granularity::Weekly => {
            let week = date.iso_week().week();
            (format!("KW {week}"), week_sort_key(week))
        }
        Granularity::Monthly => (
            month_label(date.month(), date.year()),
            month_sort_key(date.month()),
        ),
    }
}

fn apply_entry(bucket: &mut PeriodBucket, entry: &ClassifiedEntry) {
    match entry.category {
        EventCategory::Tardiness => bucket.tardiness += 1,
        EventCategory::Absence => {
            bucket.absence_total += 1;
            match entry.outcome {
                ExcuseOutcome::Excused => bucket.absence_excused += 1,
                ExcuseOutcome::Unexcused => bucket.absence_unexcused += 1,
                ExcuseOutcome::Pending => {}
            }
        }
    }
}

fn format_span(first: NaiveDate, last: NaiveDate) -> String {
    format!(
        "{} - {}",
        first.format("%d.%m.%Y"),
        last.format("%d.%m.%Y")
    )
}
