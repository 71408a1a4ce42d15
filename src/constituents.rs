//! # Tidal Constituent Table
//!
//! The eight constituents used by the offline model, with their angular
//! speeds in degrees per hour. The speeds are physical constants and set the
//! period of every synthesized wave (e.g. M2: 360 / 28.984104 ≈ 12.42 h).
//!
//! Base amplitudes and phase offsets are the model's location-agnostic
//! starting point; [`crate::fallback`] scales and shifts them per location.

/// Semidiurnal constituents cycle twice per day, diurnal ones once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Semidiurnal,
    Diurnal,
}

/// One row of the constituent table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constituent {
    pub name: &'static str,
    /// Angular speed in degrees per hour
    pub speed_deg_per_hour: f64,
    /// Global average amplitude in meters
    pub base_amplitude_m: f64,
    /// Fixed phase offset added to the longitude shift, in degrees
    pub phase_offset_deg: f64,
    pub band: Band,
}

/// Amplitude used for a name missing from the table.
pub const DEFAULT_AMPLITUDE_M: f64 = 0.1;

/// Every constituent the model knows about, in conventional order.
pub const CONSTITUENTS: [Constituent; 8] = [
    Constituent {
        name: "m2",
        speed_deg_per_hour: 28.984104,
        base_amplitude_m: 0.5,
        phase_offset_deg: 0.0,
        band: Band::Semidiurnal,
    },
    Constituent {
        name: "s2",
        speed_deg_per_hour: 30.0,
        base_amplitude_m: 0.2,
        phase_offset_deg: 30.0,
        band: Band::Semidiurnal,
    },
    Constituent {
        name: "n2",
        speed_deg_per_hour: 28.439730,
        base_amplitude_m: 0.1,
        phase_offset_deg: -15.0,
        band: Band::Semidiurnal,
    },
    Constituent {
        name: "k2",
        speed_deg_per_hour: 30.082137,
        base_amplitude_m: 0.05,
        phase_offset_deg: 45.0,
        band: Band::Semidiurnal,
    },
    Constituent {
        name: "k1",
        speed_deg_per_hour: 15.041069,
        base_amplitude_m: 0.3,
        phase_offset_deg: 20.0,
        band: Band::Diurnal,
    },
    Constituent {
        name: "o1",
        speed_deg_per_hour: 13.943035,
        base_amplitude_m: 0.2,
        phase_offset_deg: -10.0,
        band: Band::Diurnal,
    },
    Constituent {
        name: "p1",
        speed_deg_per_hour: 14.958931,
        base_amplitude_m: 0.1,
        phase_offset_deg: 30.0,
        band: Band::Diurnal,
    },
    Constituent {
        name: "q1",
        speed_deg_per_hour: 13.398661,
        base_amplitude_m: 0.05,
        phase_offset_deg: -20.0,
        band: Band::Diurnal,
    },
];

/// Names of all table entries, in table order.
pub const ALL_NAMES: [&str; 8] = ["m2", "s2", "n2", "k2", "k1", "o1", "p1", "q1"];

/// Look up a constituent by (lowercase) name.
pub fn lookup(name: &str) -> Option<&'static Constituent> {
    CONSTITUENTS.iter().find(|c| c.name == name)
}

/// Angular speed in degrees per hour, `None` for unknown names.
pub fn speed_deg_per_hour(name: &str) -> Option<f64> {
    lookup(name).map(|c| c.speed_deg_per_hour)
}
