//! # Tide Extrema and Current State
//!
//! Helpers shared by every consumer of a height series, whichever source
//! produced it:
//! - [`find_extremes`]: strict local maxima/minima → high/low events
//! - [`current_tide`]: linear interpolation of the height at "now" plus direction
//! - [`next_high_low`]: first upcoming high and low
//!
//! Plateaus (equal neighbouring heights) never produce an extremum. A smooth
//! harmonic series practically never has them; sampled API data might.

use chrono::{DateTime, Utc};

use crate::tide_data::TideError;
use crate::{HeightSample, HourlyHeightSeries, TideExtreme, TideKind};

/// Scan for strict local extrema, in ascending time order.
///
/// The first and last samples are never classified, so series shorter than
/// three samples give an empty result.
pub fn find_extremes(series: &HourlyHeightSeries) -> Vec<TideExtreme> {
    series
        .samples()
        .windows(3)
        .filter_map(|w| {
            let (prev, cur, next) = (w[0].height_m, w[1].height_m, w[2].height_m);
            let kind = if cur > prev && cur > next {
                TideKind::High
            } else if cur < prev && cur < next {
                TideKind::Low
            } else {
                return None;
            };
            Some(TideExtreme {
                time: w[1].time,
                height_m: cur,
                kind,
            })
        })
        .collect()
}

/// [`find_extremes`] over parallel time/height slices.
///
/// # Errors
/// [`TideError::InvalidInput`] if the slices differ in length or the times are
/// not strictly increasing.
pub fn find_extremes_from_parts(
    times: &[DateTime<Utc>],
    heights: &[f64],
) -> Result<Vec<TideExtreme>, TideError> {
    if times.len() != heights.len() {
        return Err(TideError::InvalidInput(format!(
            "{} timestamps but {} heights",
            times.len(),
            heights.len()
        )));
    }
    let samples = times
        .iter()
        .zip(heights)
        .map(|(&time, &height_m)| HeightSample { time, height_m })
        .collect();
    Ok(find_extremes(&HourlyHeightSeries::new(samples)?))
}

/// Tide height and direction at a given instant.
///
/// Both fields are `None` for an empty series. `is_rising` is also `None` when
/// the instant lies outside the series, where direction is undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CurrentTide {
    pub height_m: Option<f64>,
    pub is_rising: Option<bool>,
}

/// Interpolate the height at `now` from the surrounding samples.
///
/// - `before`: latest sample at or before `now`
/// - `after`: earliest sample strictly after `now`
///
/// With both present the height is linear between them and the tide is rising
/// only if `after` is strictly higher. Otherwise the closest sample is used
/// as-is with no direction.
pub fn current_tide(series: &HourlyHeightSeries, now: DateTime<Utc>) -> CurrentTide {
    let samples = series.samples();
    if samples.is_empty() {
        return CurrentTide::default();
    }

    let split = samples.partition_point(|s| s.time <= now);
    let before = split.checked_sub(1).map(|i| &samples[i]);
    let after = samples.get(split);

    match (before, after) {
        (Some(before), Some(after)) => {
            let span = (after.time - before.time).num_milliseconds() as f64;
            let offset = (now - before.time).num_milliseconds() as f64;
            let fraction = if span > 0.0 { offset / span } else { 0.0 };
            let height = before.height_m + (after.height_m - before.height_m) * fraction;
            CurrentTide {
                height_m: Some(height),
                is_rising: Some(after.height_m > before.height_m),
            }
        }
        _ => {
            let closest = samples
                .iter()
                .min_by_key(|s| (s.time - now).num_milliseconds().abs());
            CurrentTide {
                height_m: closest.map(|s| s.height_m),
                is_rising: None,
            }
        }
    }
}

/// First high and first low strictly after `now`.
pub fn next_high_low(
    extremes: &[TideExtreme],
    now: DateTime<Utc>,
) -> (Option<TideExtreme>, Option<TideExtreme>) {
    let next_of = |kind: TideKind| {
        extremes
            .iter()
            .find(|e| e.time > now && e.kind == kind)
            .copied()
    };
    (next_of(TideKind::High), next_of(TideKind::Low))
}
