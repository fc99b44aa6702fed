use crate::domain::model::{Observation, TimeSeries, TrendSeries};

/// Trailing mean over the `window` most recent entries of `series`.
///
/// The window counts entries, not calendar months: a gap in the period
/// domain is not bridged. Entries with fewer than `window` predecessors
/// (inclusive) are absent, as is any entry whose window holds an absent
/// value.
pub fn trailing_average(series: &TimeSeries, window: usize) -> TrendSeries {
    let points = series.points();
    let window = window.max(1);

    let trend = points
        .iter()
        .enumerate()
        .map(|(idx, point)| {
            let value = if idx + 1 < window {
                None
            } else {
                mean(&points[idx + 1 - window..=idx])
            };
            Observation {
                period: point.period,
                value,
            }
        })
        .collect();

    TrendSeries {
        window,
        points: trend,
    }
}

fn mean(slice: &[Observation]) -> Option<f64> {
    let sum = slice
        .iter()
        .map(|p| p.value)
        .sum::<Option<f64>>()?;
    Some(sum / slice.len() as f64)
}
