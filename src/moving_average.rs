use crate::models::{Metric, PeriodBucket, TrendPoint};
use crate::stats::{coerce, outlier_flags};

/// Trailing moving average over one bucket counter, with IQR outlier flags.
/// The window is left-clamped, so early points average over what exists. A
/// window below 2 is caller misuse and passes the series through untouched.
pub fn moving_average(buckets: &[PeriodBucket], window: usize, metric: Metric) -> Vec<TrendPoint> {
    let values: Vec<f64> = buckets.iter().map(|b| coerce(b.metric(metric))).collect();

    if window < 2 || buckets.is_empty() {
        return buckets
            .iter()
            .zip(&values)
            .map(|(bucket, &value)| passthrough_point(bucket, value))
            .collect();
    }

    let window = window.min(values.len());
    let flags = outlier_flags(&values);

    buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let start = i.saturating_sub(window - 1);
            let slice = &values[start..=i];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            TrendPoint {
                label: bucket.label.clone(),
                value: Some(values[i]),
                moving_average: Some(mean),
                is_outlier: flags[i],
                is_prediction: false,
            }
        })
        .collect()
}

fn passthrough_point(bucket: &PeriodBucket, value: f64) -> TrendPoint {
    TrendPoint {
        label: bucket.label.clone(),
        value: Some(value),
        moving_average: None,
        is_outlier: false,
        is_prediction: false,
    }
}
