//! # Dive Tracker Core Library
//!
//! Data structures and computation for the dive conditions dashboard. The
//! library pulls marine weather, tide predictions and (optionally) turbidity
//! for a list of dive spots, then derives a safety level and a visibility
//! estimate for each one.
//!
//! ## Tide Pipeline
//!
//! Tide data comes from one of two places:
//! 1. **Online**: Stormglass extremes + hourly sea level → [`TidePredictionResult`]
//!    tagged [`TideSource::Api`]
//! 2. **Offline**: harmonic constituent model ([`fallback`]) → extrema scan
//!    ([`extrema`]) → result tagged [`TideSource::Harmonic`]
//!
//! Every stage is a pure function of `(lat, lng, days, now)`. Nothing is shared
//! between requests, so predictions for many spots can run in parallel.
//!
//! ## Core Types
//!
//! - [`HeightSample`]: one `(time, height)` pair
//! - [`HourlyHeightSeries`]: strictly time-ordered samples
//! - [`TideExtreme`]: a high or low water event
//! - [`TidePredictionResult`]: everything a consumer needs for one location

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tide_data::TideError;

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod constituents;
pub mod extrema;
pub mod fallback;
pub mod marine;
pub mod renderer;
pub mod safety;
pub mod tide_data;
pub mod visibility;

#[cfg(test)]
mod tests;

/// A single tide height at an absolute instant.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use dive_tracker_lib::HeightSample;
///
/// let sample = HeightSample {
///     time: Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap(),
///     height_m: 1.8,
/// };
/// assert_eq!(sample.height_m, 1.8);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightSample {
    pub time: DateTime<Utc>,
    /// Height in meters above the model or station datum
    pub height_m: f64,
}

/// Ordered tide heights, strictly increasing in time.
///
/// The ordering is checked once in [`HourlyHeightSeries::new`]; every consumer
/// (extrema scan, interpolation, charts) relies on it afterwards. The harmonic
/// path produces exactly one sample per hour, API data is whatever the
/// provider returned as long as it is ordered.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use dive_tracker_lib::{HeightSample, HourlyHeightSeries};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
/// let series = HourlyHeightSeries::new(vec![
///     HeightSample { time: t0, height_m: 1.0 },
///     HeightSample { time: t0 + Duration::hours(1), height_m: 1.4 },
/// ])
/// .unwrap();
/// assert_eq!(series.len(), 2);
///
/// // Out-of-order input is rejected
/// let bad = HourlyHeightSeries::new(vec![
///     HeightSample { time: t0 + Duration::hours(1), height_m: 1.0 },
///     HeightSample { time: t0, height_m: 1.4 },
/// ]);
/// assert!(bad.is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HeightSample>", into = "Vec<HeightSample>")]
pub struct HourlyHeightSeries {
    samples: Vec<HeightSample>,
}

impl HourlyHeightSeries {
    /// Build a series, rejecting samples that are not strictly increasing in time.
    pub fn new(samples: Vec<HeightSample>) -> Result<Self, TideError> {
        if let Some(pos) = samples.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(TideError::InvalidInput(format!(
                "height series not strictly increasing in time at index {}",
                pos + 1
            )));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[HeightSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&HeightSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&HeightSample> {
        self.samples.last()
    }

    /// Samples with `start <= time < end`, still ordered.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[HeightSample] {
        let lo = self.samples.partition_point(|s| s.time < start);
        let hi = self.samples.partition_point(|s| s.time < end);
        &self.samples[lo..hi.max(lo)]
    }

    /// Lowest and highest height, `None` for an empty series.
    pub fn height_range(&self) -> Option<(f64, f64)> {
        if self.samples.is_empty() {
            return None;
        }
        Some(
            self.samples
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), s| {
                    (min.min(s.height_m), max.max(s.height_m))
                }),
        )
    }
}

impl TryFrom<Vec<HeightSample>> for HourlyHeightSeries {
    type Error = TideError;

    fn try_from(samples: Vec<HeightSample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<HourlyHeightSeries> for Vec<HeightSample> {
    fn from(series: HourlyHeightSeries) -> Self {
        series.samples
    }
}

/// High or low water.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TideKind::High => "High",
            TideKind::Low => "Low",
        }
    }
}

/// A high or low tide event.
///
/// Produced by [`extrema::find_extremes`] (or parsed from the tide API) and
/// read-only afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideExtreme {
    pub time: DateTime<Utc>,
    pub height_m: f64,
    #[serde(rename = "type")]
    pub kind: TideKind,
}

/// Where a tide prediction came from.
///
/// Consumers use this to label harmonic data as a lower-fidelity estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideSource {
    Api,
    Harmonic,
}

impl TideSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TideSource::Api => "api",
            TideSource::Harmonic => "harmonic",
        }
    }
}

/// Complete tide answer for one `(lat, lng, days)` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TidePredictionResult {
    /// High/low events in ascending time order
    pub extremes: Vec<TideExtreme>,
    pub hourly_heights: HourlyHeightSeries,
    pub fetched_at: DateTime<Utc>,
    pub source: TideSource,
}
