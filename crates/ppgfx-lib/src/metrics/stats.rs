//! Distribution statistics over the columns of a feature table.

use crate::{
    error::{PulseError, PulseResult},
    table::{FeatureTable, StatsTable},
};
use log::warn;

/// Reduce every column of `table` to the nine summary statistics.
///
/// Missing rows and NaN entries are excluded. Statistics that need more
/// values than a column has (std below 2, skew below 3, kurtosis below 4)
/// are NaN. A column with no values at all is an error.
pub fn summarize(table: &FeatureTable) -> PulseResult<StatsTable> {
    if table.is_empty() {
        return Err(PulseError::degenerate("feature table has no rows"));
    }
    let missing = table.missing();
    if missing > 0 {
        warn!(
            "summarizing {} rows, {missing} missing rows excluded",
            table.len()
        );
    }
    let per_column = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<f64> = table.column(idx).into_iter().filter(|v| !v.is_nan()).collect();
            column_stats(&values).map_err(|_| {
                PulseError::degenerate(format!("column `{name}` has no values to summarize"))
            })
        })
        .collect::<PulseResult<Vec<_>>>()?;
    Ok(StatsTable::from_columns(table.columns().to_vec(), &per_column))
}

/// All nine statistics of one column, in output order.
pub fn column_stats(values: &[f64]) -> PulseResult<[f64; 9]> {
    if values.is_empty() {
        return Err(PulseError::degenerate("no values"));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mean = mean(values);
    let p25 = percentile(&sorted, 0.25);
    let p75 = percentile(&sorted, 0.75);
    Ok([
        mean,
        percentile(&sorted, 0.5),
        std_dev(values, mean),
        p25,
        p75,
        p75 - p25,
        skewness(values, mean),
        kurtosis(values, mean),
        mad(values, mean),
    ])
}

/// Arithmetic mean, accumulated relative to the first value so that a
/// constant column returns that constant exactly.
pub fn mean(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return f64::NAN;
    };
    first + values.iter().map(|x| x - first).sum::<f64>() / values.len() as f64
}

/// Linear interpolation between order statistics of an ascending slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let ss: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

fn central_moment(values: &[f64], mean: f64, k: i32) -> f64 {
    values.iter().map(|x| (x - mean).powi(k)).sum::<f64>() / values.len() as f64
}

/// Adjusted Fisher-Pearson skewness `G1`.
pub fn skewness(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return f64::NAN;
    }
    let m2 = central_moment(values, mean, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let m3 = central_moment(values, mean, 3);
    (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
}

/// Adjusted excess kurtosis `G2`.
pub fn kurtosis(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return f64::NAN;
    }
    let m2 = central_moment(values, mean, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let m4 = central_moment(values, mean, 4);
    (n - 1.0) / ((n - 2.0) * (n - 3.0)) * ((n + 1.0) * m4 / (m2 * m2) - 3.0 * (n - 1.0))
}

/// Mean absolute deviation from the mean.
pub fn mad(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().map(|x| (x - mean).abs()).sum::<f64>() / values.len() as f64
}
