//! # Harmonic Fallback Tide Model
//!
//! Offline tide predictions for any coordinate, used when the tide API is not
//! configured or fails. The model superposes the eight constituents from
//! [`crate::constituents`]:
//!
//! ```text
//! height(t) = MSL(lat) + Σ A_i · cos(ω_i · t − φ_i)
//! ```
//!
//! with `t` in hours since the Unix epoch, `ω_i` the constituent speed in
//! radians per hour and `A_i`, `φ_i` estimated from the location.
//!
//! ## Location Heuristics
//!
//! ### Amplitude
//! Base amplitudes are global averages, scaled by latitude band:
//! - **Tropical** (`|lat| < 30`): ×1.2
//! - **Temperate** (`30 ≤ |lat| < 60`): ×1.0
//! - **Polar** (`|lat| ≥ 60`): ×0.7
//!
//! ### Phase
//! Longitude acts as a time-zone-like shift (15° ≈ 1 hour):
//! - **Semidiurnal**: `(lng / 15) × 30 + offset`
//! - **Diurnal**: `(lng / 15) × 15 + offset`
//!
//! ### Mean Sea Level
//! `1.5 m` tropical, `1.0 m` temperate, `0.5 m` polar.
//!
//! ## Accuracy Trade-offs
//! - ✅ **Correct periods**: constituent speeds are the real ones
//! - ✅ **Mixed tides**: diurnal inequality comes out of the K1/O1/P1/Q1 terms
//! - ❌ **No nodal corrections** or astronomical arguments
//! - ❌ **No local fitting**: amplitudes and phases are geometric guesses
//!
//! Results are tagged [`TideSource::Harmonic`] so the dashboard can label them
//! as an estimate.

use chrono::{DateTime, Duration, Utc};

use crate::constituents::{self, Band, Constituent, CONSTITUENTS, DEFAULT_AMPLITUDE_M};
use crate::extrema;
use crate::tide_data::TideError;
use crate::{HeightSample, HourlyHeightSeries, TidePredictionResult, TideSource};

/// Longest prediction window accepted, in days.
pub const MAX_DAYS: i64 = 366;

/// Amplitude multiplier for the latitude band.
pub fn latitude_factor(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    if abs_lat < 30.0 {
        1.2
    } else if abs_lat < 60.0 {
        1.0
    } else {
        0.7
    }
}

/// Mean sea level offset in meters for the latitude band.
pub fn mean_sea_level(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    if abs_lat < 30.0 {
        1.5
    } else if abs_lat < 60.0 {
        1.0
    } else {
        0.5
    }
}

/// Amplitude and phase estimated for one constituent at one location.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalConstituent {
    pub name: String,
    pub amplitude_m: f64,
    /// Phase in radians, within `[0, 2π)`
    pub phase_rad: f64,
}

/// Estimate amplitude (meters) for `name` at latitude `lat`.
///
/// Names missing from the table get [`DEFAULT_AMPLITUDE_M`].
pub fn estimate_amplitude(name: &str, lat: f64) -> f64 {
    let base = constituents::lookup(name)
        .map(|c| c.base_amplitude_m)
        .unwrap_or(DEFAULT_AMPLITUDE_M);
    base * latitude_factor(lat)
}

/// Estimate phase (radians, `[0, 2π)`) for `name` at longitude `lng`.
///
/// Names missing from the table use offset 0 and the diurnal shift.
pub fn estimate_phase(name: &str, lng: f64) -> f64 {
    let (band, offset) = constituents::lookup(name)
        .map(|c| (c.band, c.phase_offset_deg))
        .unwrap_or((Band::Diurnal, 0.0));
    phase_rad(band, offset, lng)
}

fn phase_rad(band: Band, offset_deg: f64, lng: f64) -> f64 {
    let per_hour = match band {
        Band::Semidiurnal => 30.0,
        Band::Diurnal => 15.0,
    };
    let degrees = ((lng / 15.0) * per_hour + offset_deg).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    let degrees = if degrees >= 360.0 { 0.0 } else { degrees };
    degrees.to_radians()
}

/// Estimate amplitude and phase for every requested constituent.
///
/// Pure and infallible for any real coordinate; range checks belong to the
/// spot configuration. Output order follows `names`.
pub fn estimate(lat: f64, lng: f64, names: &[&str]) -> Vec<LocalConstituent> {
    names
        .iter()
        .map(|name| LocalConstituent {
            name: (*name).to_string(),
            amplitude_m: estimate_amplitude(name, lat),
            phase_rad: estimate_phase(name, lng),
        })
        .collect()
}

/// One cosine term ready for synthesis.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicTerm {
    pub name: &'static str,
    /// Angular speed in radians per hour
    pub omega_rad_per_hour: f64,
    pub amplitude_m: f64,
    pub phase_rad: f64,
}

impl HarmonicTerm {
    fn from_table(c: &'static Constituent, lat: f64, lng: f64) -> Self {
        Self {
            name: c.name,
            omega_rad_per_hour: c.speed_deg_per_hour.to_radians(),
            amplitude_m: c.base_amplitude_m * latitude_factor(lat),
            phase_rad: phase_rad(c.band, c.phase_offset_deg, lng),
        }
    }

    fn value_at(&self, hours: f64) -> f64 {
        self.amplitude_m * (self.omega_rad_per_hour * hours - self.phase_rad).cos()
    }
}

/// Constituent speeds plus per-location amplitudes and phases.
///
/// Built fresh for each query; nothing is cached across locations.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstituentSet {
    terms: Vec<HarmonicTerm>,
}

impl ConstituentSet {
    /// All eight table constituents for a location.
    pub fn standard(lat: f64, lng: f64) -> Self {
        Self {
            terms: CONSTITUENTS
                .iter()
                .map(|c| HarmonicTerm::from_table(c, lat, lng))
                .collect(),
        }
    }

    /// A subset of constituents for a location.
    ///
    /// Every name needs a known speed, so unknown names are rejected here even
    /// though [`estimate`] tolerates them.
    pub fn for_location(lat: f64, lng: f64, names: &[&str]) -> Result<Self, TideError> {
        let terms = names
            .iter()
            .map(|name| {
                constituents::lookup(name)
                    .map(|c| HarmonicTerm::from_table(c, lat, lng))
                    .ok_or_else(|| {
                        TideError::InvalidInput(format!("unknown tidal constituent '{name}'"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    /// Use explicit terms, e.g. a single wave with hand-picked amplitude.
    pub fn from_terms(terms: Vec<HarmonicTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[HarmonicTerm] {
        &self.terms
    }

    /// Sum of all amplitudes, an upper bound on deviation from mean sea level.
    pub fn total_amplitude(&self) -> f64 {
        self.terms.iter().map(|t| t.amplitude_m.abs()).sum()
    }
}

/// Hours since the Unix epoch, the model's time axis.
pub fn hours_since_epoch(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 3_600_000.0
}

/// Predicted height at a single instant.
pub fn height_at(t: DateTime<Utc>, set: &ConstituentSet, lat: f64) -> f64 {
    let hours = hours_since_epoch(t);
    let tide: f64 = set.terms.iter().map(|term| term.value_at(hours)).sum();
    mean_sea_level(lat) + tide
}

/// Predicted heights for every timestamp, in input order.
///
/// Deterministic: the same inputs always give the same output.
pub fn synthesize(times: &[DateTime<Utc>], set: &ConstituentSet, lat: f64) -> Vec<f64> {
    times.iter().map(|t| height_at(*t, set, lat)).collect()
}

/// Hourly timestamps `start, start + 1h, …` for `days × 24` hours.
pub fn hourly_grid(start: DateTime<Utc>, days: i64) -> Result<Vec<DateTime<Utc>>, TideError> {
    validate_days(days)?;
    Ok((0..days * 24).map(|h| start + Duration::hours(h)).collect())
}

pub(crate) fn validate_days(days: i64) -> Result<(), TideError> {
    if days <= 0 {
        return Err(TideError::InvalidInput(format!(
            "days must be positive, got {days}"
        )));
    }
    if days > MAX_DAYS {
        return Err(TideError::InvalidInput(format!(
            "days must be at most {MAX_DAYS}, got {days}"
        )));
    }
    Ok(())
}

/// Generate an offline tide prediction for `days` days from `now`.
/// If `now` is `None`, fall back to `Utc::now()`.
///
/// The hourly series has exactly `days × 24` samples starting at `now`.
/// `extremes` is empty only for a perfectly flat series, which is tolerated.
///
/// # Errors
/// [`TideError::InvalidInput`] when `days` is not positive or exceeds [`MAX_DAYS`].
pub fn approximate(
    lat: f64,
    lng: f64,
    days: i64,
    now: Option<DateTime<Utc>>,
) -> Result<TidePredictionResult, TideError> {
    let now = now.unwrap_or_else(Utc::now);
    let times = hourly_grid(now, days)?;

    let set = ConstituentSet::standard(lat, lng);
    let heights = synthesize(&times, &set, lat);

    let samples = times
        .into_iter()
        .zip(heights)
        .map(|(time, height_m)| HeightSample { time, height_m })
        .collect();
    let hourly_heights = HourlyHeightSeries::new(samples)?;
    let extremes = extrema::find_extremes(&hourly_heights);

    tracing::debug!(
        lat,
        lng,
        days,
        samples = hourly_heights.len(),
        extremes = extremes.len(),
        "harmonic tide prediction"
    );

    Ok(TidePredictionResult {
        extremes,
        hourly_heights,
        fetched_at: now,
        source: TideSource::Harmonic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::f64::consts::TAU;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 24, 0, 0, 0).unwrap()
    }

    #[test]
    fn latitude_bands_scale_amplitude() {
        assert_eq!(latitude_factor(7.6), 1.2);
        assert_eq!(latitude_factor(-29.99), 1.2);
        assert_eq!(latitude_factor(30.0), 1.0);
        assert_eq!(latitude_factor(-59.9), 1.0);
        assert_eq!(latitude_factor(60.0), 0.7);
        assert_eq!(latitude_factor(-89.0), 0.7);
    }

    #[test]
    fn tropical_beats_temperate_beats_polar() {
        for name in constituents::ALL_NAMES {
            let tropical = estimate_amplitude(name, 10.0);
            let temperate = estimate_amplitude(name, 45.0);
            let polar = estimate_amplitude(name, 70.0);
            assert!(tropical > temperate && temperate > polar, "{name}");
        }
    }

    #[test]
    fn mean_sea_level_by_band() {
        assert_eq!(mean_sea_level(0.0), 1.5);
        assert_eq!(mean_sea_level(45.0), 1.0);
        assert_eq!(mean_sea_level(-75.0), 0.5);
    }

    #[test]
    fn unknown_constituent_gets_defaults() {
        let est = estimate(45.0, 15.0, &["m4"]);
        assert_eq!(est.len(), 1);
        assert!((est[0].amplitude_m - 0.1).abs() < 1e-12);
        // diurnal shift: (15/15)*15 + 0 = 15 degrees
        assert!((est[0].phase_rad - 15f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn phases_are_normalized() {
        for lng in [-180.0, -97.3, 0.0, 98.37, 179.9, 540.0] {
            for c in estimate(0.0, lng, &constituents::ALL_NAMES) {
                assert!(
                    (0.0..TAU).contains(&c.phase_rad),
                    "{} at lng {lng}: {}",
                    c.name,
                    c.phase_rad
                );
            }
        }
    }

    #[test]
    fn phase_follows_longitude_formula() {
        // s2 at lng 98.37: (98.37/15)*30 + 30 = 226.74 degrees
        let phase = estimate_phase("s2", 98.37);
        assert!((phase - 226.74f64.to_radians()).abs() < 1e-9);

        // q1 at lng 0: -20 wraps to 340 degrees
        let phase = estimate_phase("q1", 0.0);
        assert!((phase - 340f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn estimate_preserves_request_order() {
        let names = ["k1", "m2", "q1"];
        let est = estimate(7.6, 98.37, &names);
        let got: Vec<&str> = est.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(got, names);
    }

    #[test]
    fn for_location_rejects_unknown_names() {
        let err = ConstituentSet::for_location(0.0, 0.0, &["m2", "zz"]).unwrap_err();
        assert!(matches!(err, TideError::InvalidInput(_)));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let times: Vec<_> = (0..72).map(|h| t0() + Duration::hours(h)).collect();
        let set = ConstituentSet::standard(7.6, 98.37);
        let a = synthesize(&times, &set, 7.6);
        let b = synthesize(&times, &ConstituentSet::standard(7.6, 98.37), 7.6);
        assert_eq!(a, b);
    }

    #[test]
    fn heights_stay_within_amplitude_envelope() {
        let set = ConstituentSet::standard(45.0, -70.0);
        let bound = set.total_amplitude();
        let times: Vec<_> = (0..24 * 7).map(|h| t0() + Duration::hours(h)).collect();
        for h in synthesize(&times, &set, 45.0) {
            assert!((h - 1.0).abs() <= bound + 1e-9, "height {h}");
        }
    }

    #[test]
    fn zero_amplitude_gives_flat_mean_sea_level() {
        let set = ConstituentSet::from_terms(vec![HarmonicTerm {
            name: "m2",
            omega_rad_per_hour: 28.984104f64.to_radians(),
            amplitude_m: 0.0,
            phase_rad: 0.0,
        }]);
        let times: Vec<_> = (0..10).map(|h| t0() + Duration::hours(h)).collect();
        assert!(synthesize(&times, &set, 70.0).iter().all(|&h| h == 0.5));
    }

    #[test]
    fn approximate_has_days_times_24_hourly_samples() {
        let result = approximate(7.6, 98.37, 3, Some(t0())).unwrap();
        assert_eq!(result.hourly_heights.len(), 72);
        assert_eq!(result.source, TideSource::Harmonic);
        assert_eq!(result.hourly_heights.first().unwrap().time, t0());
        for w in result.hourly_heights.samples().windows(2) {
            assert_eq!(w[1].time - w[0].time, Duration::hours(1));
        }
        assert!(!result.extremes.is_empty());
    }

    #[test]
    fn approximate_rejects_non_positive_days() {
        for days in [0, -1, -30] {
            let err = approximate(7.6, 98.37, days, Some(t0())).unwrap_err();
            assert!(matches!(err, TideError::InvalidInput(_)), "days={days}");
        }
    }

    #[test]
    fn approximate_rejects_huge_windows() {
        let err = approximate(7.6, 98.37, MAX_DAYS + 1, Some(t0())).unwrap_err();
        assert!(matches!(err, TideError::InvalidInput(_)));
    }
}
