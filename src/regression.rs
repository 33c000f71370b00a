use chrono::{Datelike, NaiveDate};

use crate::models::{
    Granularity, Metric, PeriodBucket, RegressionOptions, RegressionOutcome, TrendPoint,
};
use crate::schoolyear::{
    month_for_week, month_from_sort_key, school_days_in_month, school_days_in_week_of_month,
    week_from_sort_key,
};
use crate::stats::{coerce, outlier_flags};

const MIN_FIT_POINTS: usize = 2;
const STABLE_SLOPE: f64 = 0.01;
const LOW_CORRELATION_R2: f64 = 0.1;
const PREDICTION_MIN_R2: f64 = 0.2;

/// Label given to the appended one-step-ahead point.
const PREDICTION_LABEL: &str = "Prognose";

/// Ordinary-least-squares trend fit over a period series. Outliers are
/// flagged first and optionally kept out of the estimation; they stay in the
/// returned series so charts can still show them. With
/// `use_relative_values`, counts are converted to events per school day
/// before fitting so periods of uneven length compare.
pub fn fit_trend(
    buckets: &[PeriodBucket],
    metric: Metric,
    granularity: Granularity,
    options: RegressionOptions,
) -> (Vec<TrendPoint>, RegressionOutcome) {
    let values: Vec<f64> = buckets
        .iter()
        .map(|bucket| {
            let raw = coerce(bucket.metric(metric));
            if options.use_relative_values {
                per_school_day(raw, bucket, granularity)
            } else {
                raw
            }
        })
        .collect();

    let flags = outlier_flags(&values);
    let mut points: Vec<TrendPoint> = buckets
        .iter()
        .zip(values.iter().zip(&flags))
        .map(|(bucket, (&value, &flag))| TrendPoint {
            label: bucket.label.clone(),
            value: Some(value),
            moving_average: None,
            is_outlier: flag,
            is_prediction: false,
        })
        .collect();

    let fitted: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|&(i, _)| !(options.exclude_outliers && flags[i]))
        .map(|(i, &y)| (i as f64, y))
        .collect();

    let outlier_indices: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter_map(|(i, &flag)| flag.then_some(i))
        .collect();

    if fitted.len() < MIN_FIT_POINTS {
        return (points, RegressionOutcome::insufficient());
    }

    let first_y = fitted[0].1;
    if fitted.iter().all(|&(_, y)| (y - first_y).abs() < f64::EPSILON) {
        let mut outcome = RegressionOutcome {
            slope: 0.0,
            intercept: first_y,
            r_squared: 1.0,
            trend: "constant".to_string(),
            prediction: Some(first_y),
            outlier_indices,
        };
        append_prediction(&mut points, &mut outcome);
        return (points, outcome);
    }

    let n = fitted.len() as f64;
    let sum_x: f64 = fitted.iter().map(|&(x, _)| x).sum();
    let sum_y: f64 = fitted.iter().map(|&(_, y)| y).sum();
    let sum_xx: f64 = fitted.iter().map(|&(x, _)| x * x).sum();
    let sum_xy: f64 = fitted.iter().map(|&(x, y)| x * y).sum();

    // normal equations for the design matrix [1, x]
    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < 1e-10 {
        return (points, RegressionOutcome::insufficient());
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let tss: f64 = fitted.iter().map(|&(_, y)| (y - mean_y).powi(2)).sum();
    let rss: f64 = fitted
        .iter()
        .map(|&(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = if tss > 1e-10 { 1.0 - rss / tss } else { 1.0 };

    let mut outcome = RegressionOutcome {
        slope,
        intercept,
        r_squared,
        trend: trend_label(slope, r_squared),
        prediction: None,
        outlier_indices,
    };

    if r_squared > PREDICTION_MIN_R2 {
        outcome.prediction = Some(intercept + slope * buckets.len() as f64);
    }
    append_prediction(&mut points, &mut outcome);

    (points, outcome)
}

fn append_prediction(points: &mut Vec<TrendPoint>, outcome: &mut RegressionOutcome) {
    if outcome.prediction.is_some() {
        points.push(TrendPoint {
            label: PREDICTION_LABEL.to_string(),
            value: None,
            moving_average: None,
            is_outlier: false,
            is_prediction: true,
        });
    }
}

/// Convert an absolute count into events per school day of the bucket's
/// period. Months with no school days (summer break) yield a zero rate
/// rather than dividing by zero.
fn per_school_day(value: f64, bucket: &PeriodBucket, granularity: Granularity) -> f64 {
    let school_days = match granularity {
        Granularity::Monthly => month_from_sort_key(bucket.sort_key)
            .map(school_days_in_month)
            .unwrap_or(0.0),
        Granularity::Weekly => week_from_sort_key(bucket.sort_key)
            .map(|week| school_days_in_week_of_month(month_for_week(week)))
            .unwrap_or(0.0),
        Granularity::Daily => NaiveDate::from_num_days_from_ce_opt(bucket.sort_key)
            .map(|date| if is_school_day(date) { 1.0 } else { 0.0 })
            .unwrap_or(1.0),
    };

    if school_days <= f64::EPSILON {
        0.0
    } else {
        value / school_days
    }
}

fn is_school_day(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() <= 5
}

/// Human-readable trend from slope magnitude and fit reliability.
fn trend_label(slope: f64, r_squared: f64) -> String {
    if r_squared < LOW_CORRELATION_R2 {
        return "no clear trend (low correlation)".to_string();
    }

    let reliability = if r_squared < 0.3 {
        "low confidence"
    } else if r_squared < 0.5 {
        "moderate confidence"
    } else if r_squared < 0.7 {
        "good confidence"
    } else {
        "high confidence"
    };

    if slope.abs() < STABLE_SLOPE {
        return format!("stable ({reliability})");
    }

    let direction = if slope > 0.0 { "ascending" } else { "descending" };
    let magnitude = match slope.abs() {
        m if m < 0.2 => "slightly",
        m if m < 0.5 => "moderately",
        m if m < 1.0 => "strongly",
        _ => "very strongly",
    };

    format!("{magnitude} {direction} ({reliability})")
}
