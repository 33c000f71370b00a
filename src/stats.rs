//! Quartile and outlier helpers shared by the moving-average and regression
//! engines.

/// The IQR rule needs at least four points to say anything about spread.
pub const MIN_OUTLIER_POINTS: usize = 4;

const IQR_FACTOR: f64 = 1.5;

/// Non-finite inputs count as zero instead of poisoning downstream sums.
pub fn coerce(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Tukey fences from positional quartiles (no interpolation). The lower
/// bound clamps at zero since attendance counts cannot go negative.
pub fn outlier_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < MIN_OUTLIER_POINTS {
        return None;
    }

    let mut sorted: Vec<f64> = values.iter().map(|&v| coerce(v)).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let q1 = sorted[(n / 4).min(n - 1)];
    let q3 = sorted[(3 * n / 4).min(n - 1)];
    let iqr = q3 - q1;

    let lower = (q1 - IQR_FACTOR * iqr).max(0.0);
    let upper = q3 + IQR_FACTOR * iqr;
    Some((lower, upper))
}

/// One flag per input value; all false when the series is too short.
pub fn outlier_flags(values: &[f64]) -> Vec<bool> {
    match outlier_bounds(values) {
        Some((lower, upper)) => values
            .iter()
            .map(|&v| {
                let v = coerce(v);
                v < lower || v > upper
            })
            .collect(),
        None => vec![false; values.len()],
    }
}
