use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::{Granularity, PeriodBucket};
use crate::schoolyear::{
    month_from_sort_key, month_label, month_sort_key, next_calendar_month, next_week,
    week_from_sort_key, week_sort_key,
};

/// Series with at least this many points are dense enough for statistics;
/// completing them would manufacture zero periods where data simply has not
/// been loaded yet.
pub const SPARSE_THRESHOLD: usize = 4;

/// Fill period gaps in a sparse series with zero-valued buckets so the
/// statistics downstream see a contiguous sequence. Dense series pass
/// through (sorted) untouched.
pub fn complete_series(buckets: &[PeriodBucket], granularity: Granularity) -> Vec<PeriodBucket> {
    let mut series = buckets.to_vec();
    series.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then(a.label.cmp(&b.label)));

    if series.len() < 2 || series.len() >= SPARSE_THRESHOLD {
        return series;
    }

    let filled = match granularity {
        Granularity::Weekly => fill_weeks(series),
        Granularity::Monthly => fill_months(series),
        Granularity::Daily => fill_days(series),
    };

    let mut deduped = dedupe_by_label(filled);
    deduped.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then(a.label.cmp(&b.label)));
    deduped
}

fn fill_weeks(series: Vec<PeriodBucket>) -> Vec<PeriodBucket> {
    let weeks: Vec<u32> = series.iter().filter_map(|b| week_from_sort_key(b.sort_key)).collect();
    let (Some(&first), Some(&last)) = (weeks.first(), weeks.last()) else {
        return series;
    };
    let include_53 = weeks.contains(&53);
    let present: HashSet<u32> = weeks.into_iter().collect();

    let mut filled = series;
    let mut week = first;
    // 54 steps bound the walk even on inconsistent input
    for _ in 0..54 {
        if !present.contains(&week) {
            filled.push(PeriodBucket::empty(
                format!("KW {week}"),
                week_sort_key(week),
            ));
        }
        if week == last {
            break;
        }
        week = next_week(week, include_53);
    }
    filled
}

fn fill_months(series: Vec<PeriodBucket>) -> Vec<PeriodBucket> {
    let sep_year = september_year(&series);
    let months: Vec<u32> = series.iter().filter_map(|b| month_from_sort_key(b.sort_key)).collect();
    let (Some(&first), Some(&last)) = (months.first(), months.last()) else {
        return series;
    };
    let present: HashSet<u32> = months.into_iter().collect();

    let mut filled = series;
    let mut month = first;
    for _ in 0..12 {
        if !present.contains(&month) {
            let label = match sep_year {
                Some(year) => {
                    let offset = if month_sort_key(month) >= month_sort_key(1) {
                        1
                    } else {
                        0
                    };
                    month_label(month, year + offset)
                }
                None => month_label(month, 0),
            };
            filled.push(PeriodBucket::empty(label, month_sort_key(month)));
        }
        if month == last {
            break;
        }
        month = next_calendar_month(month);
    }
    filled
}

fn fill_days(series: Vec<PeriodBucket>) -> Vec<PeriodBucket> {
    let (Some(first), Some(last)) = (
        series.first().map(|b| b.sort_key),
        series.last().map(|b| b.sort_key),
    ) else {
        return series;
    };
    let present: HashSet<i32> = series.iter().map(|b| b.sort_key).collect();

    let mut filled = series;
    for key in first..=last {
        if !present.contains(&key) {
            let label = NaiveDate::from_num_days_from_ce_opt(key)
                .map(|d| d.format("%d.%m.%Y").to_string())
                .unwrap_or_default();
            filled.push(PeriodBucket::empty(label, key));
        }
    }
    filled
}

/// Collapse buckets whose labels normalize to the same period, keeping the
/// one carrying the most data.
fn dedupe_by_label(buckets: Vec<PeriodBucket>) -> Vec<PeriodBucket> {
    let mut kept: HashMap<String, PeriodBucket> = HashMap::new();
    for bucket in buckets {
        let key = normalize_label(&bucket.label);
        match kept.get(&key) {
            Some(existing) if existing.combined_total() >= bucket.combined_total() => {}
            _ => {
                kept.insert(key, bucket);
            }
        }
    }
    kept.into_values().collect()
}

fn normalize_label(label: &str) -> String {
    label.trim().replace('.', "").to_lowercase()
}

/// Calendar year the series' September falls into, recovered from the first
/// labelled month. Needed to label reconstructed months on the other side of
/// the January boundary.
fn september_year(series: &[PeriodBucket]) -> Option<i32> {
    for bucket in series {
        let Some(month) = month_from_sort_key(bucket.sort_key) else {
            continue;
        };
        let Some(year) = bucket
            .label
            .rsplit(' ')
            .next()
            .and_then(|tail| tail.parse::<i32>().ok())
        else {
            continue;
        };
        let offset = if month_sort_key(month) >= month_sort_key(1) {
            1
        } else {
            0
        };
        return Some(year - offset);
    }
    None
}
