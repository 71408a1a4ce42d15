//! # Harmonic Model Property Tests
//!
//! End-to-end checks of the offline pipeline: constituent set → synthesis →
//! extrema scan → interpolation. These exercise the public functions the way
//! the prediction service does, at realistic locations.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::extrema::{current_tide, find_extremes, find_extremes_from_parts};
use crate::fallback::{self, hourly_grid, synthesize, ConstituentSet};
use crate::tide_data::TideError;
use crate::{HeightSample, HourlyHeightSeries, TideKind};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()
}

fn sample(time: DateTime<Utc>, height_m: f64) -> HeightSample {
    HeightSample { time, height_m }
}

/// M2 alone: consecutive highs must follow the ~12.42 h period.
///
/// Hourly sampling quantizes each gap to 12 or 13 hours, so the individual
/// gaps are checked loosely and the mean tightly.
#[test]
fn m2_highs_follow_semidiurnal_period() {
    let set = ConstituentSet::for_location(20.0, -40.0, &["m2"]).unwrap();
    let times = hourly_grid(start(), 20).unwrap();
    let heights = synthesize(&times, &set, 20.0);
    let extremes = find_extremes_from_parts(&times, &heights).unwrap();

    let highs: Vec<_> = extremes
        .iter()
        .filter(|e| e.kind == TideKind::High)
        .map(|e| e.time)
        .collect();
    assert!(
        highs.len() >= 30,
        "expected ~38 highs in 20 days, got {}",
        highs.len()
    );

    let gaps: Vec<i64> = highs.windows(2).map(|w| (w[1] - w[0]).num_hours()).collect();
    for gap in &gaps {
        assert!((12..=13).contains(gap), "gap of {gap}h between highs");
    }
    let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    assert!(
        (mean - 12.42).abs() < 0.05,
        "mean high-to-high interval {mean:.3}h should be ~12.42h"
    );
}

/// Highs and lows alternate in the full eight-constituent model.
#[test]
fn extremes_alternate_at_several_locations() {
    for (lat, lng) in [(7.6, 98.37), (45.0, -63.0), (-33.9, 151.2), (70.0, 20.0)] {
        let result = fallback::approximate(lat, lng, 7, Some(start())).unwrap();
        assert!(
            result.extremes.len() >= 7,
            "({lat}, {lng}): only {} extremes in a week",
            result.extremes.len()
        );
        for pair in result.extremes.windows(2) {
            assert_ne!(
                pair[0].kind, pair[1].kind,
                "({lat}, {lng}): two {:?} in a row at {}",
                pair[0].kind, pair[1].time
            );
            assert!(pair[0].time < pair[1].time);
        }
    }
}

/// Tropical M2-only day: MSL 1.5 m, amplitude 0.5 × 1.2 = 0.6 m.
///
/// True highs are 2.10 m and lows 0.90 m; hourly samples land within
/// half an hour of each turn, so they sit just inside those values.
#[test]
fn tropical_m2_day_matches_expected_levels() {
    let (lat, lng) = (7.6, 98.37);
    let set = ConstituentSet::for_location(lat, lng, &["m2"]).unwrap();
    let times = hourly_grid(start(), 1).unwrap();
    assert_eq!(times.len(), 24);
    let heights = synthesize(&times, &set, lat);
    let extremes = find_extremes_from_parts(&times, &heights).unwrap();

    assert!(
        (2..=4).contains(&extremes.len()),
        "expected 2-4 extremes in 24h, got {}",
        extremes.len()
    );
    for e in &extremes {
        match e.kind {
            TideKind::High => assert!(
                (2.05..=2.11).contains(&e.height_m),
                "high {:.4} outside [2.05, 2.11]",
                e.height_m
            ),
            TideKind::Low => assert!(
                (0.89..=0.95).contains(&e.height_m),
                "low {:.4} outside [0.89, 0.95]",
                e.height_m
            ),
        }
    }
    for h in &heights {
        assert!(
            (0.9 - 1e-9..=2.1 + 1e-9).contains(h),
            "height {h} outside envelope"
        );
    }
}

/// Same inputs, same output, bit for bit.
#[test]
fn prediction_is_deterministic() {
    let a = fallback::approximate(-12.5, 130.8, 3, Some(start())).unwrap();
    let b = fallback::approximate(-12.5, 130.8, 3, Some(start())).unwrap();
    assert_eq!(a, b);
}

/// Every extreme is a real sample of the hourly series.
#[test]
fn extremes_are_samples_of_the_series() {
    let result = fallback::approximate(36.0, -5.3, 2, Some(start())).unwrap();
    for e in &result.extremes {
        let sample = result
            .hourly_heights
            .samples()
            .iter()
            .find(|s| s.time == e.time)
            .expect("extreme time must be a sample time");
        assert_eq!(sample.height_m, e.height_m);
    }
    assert_eq!(find_extremes(&result.hourly_heights), result.extremes);
}

/// Thirty minutes after a 1.0 sample, with 1.5 an hour later, reads 1.25.
#[test]
fn interpolation_scenario() {
    let t0 = start();
    let series = HourlyHeightSeries::new(vec![
        sample(t0, 1.0),
        sample(t0 + Duration::hours(1), 1.5),
        sample(t0 + Duration::hours(2), 2.0),
    ])
    .unwrap();

    let current = current_tide(&series, t0 + Duration::minutes(30));
    assert!((current.height_m.unwrap() - 1.25).abs() < 1e-9);
    assert_eq!(current.is_rising, Some(true));

    let after_end = current_tide(&series, t0 + Duration::hours(3));
    assert_eq!(after_end.height_m, Some(2.0));
    assert_eq!(after_end.is_rising, None);
}

/// Interpolating a harmonic series between two samples stays between them.
#[test]
fn current_tide_on_harmonic_series() {
    let result = fallback::approximate(7.6, 98.37, 1, Some(start())).unwrap();
    let now = start() + Duration::minutes(150);
    let current = current_tide(&result.hourly_heights, now);

    let samples = result.hourly_heights.samples();
    let (a, b) = (samples[2].height_m, samples[3].height_m);
    let h = current.height_m.unwrap();
    assert!(h >= a.min(b) && h <= a.max(b));
    assert_eq!(current.is_rising, Some(b > a));
}

#[test]
fn zero_days_is_invalid_input() {
    let err = fallback::approximate(7.6, 98.37, 0, Some(start())).unwrap_err();
    assert!(matches!(err, TideError::InvalidInput(_)));
    let err = hourly_grid(start(), -3).unwrap_err();
    assert!(matches!(err, TideError::InvalidInput(_)));
}
