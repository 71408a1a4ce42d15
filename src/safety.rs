//! # Freediving Safety Assessment
//!
//! Each marine metric is compared against its [`MetricThreshold`]:
//!
//! - **Lower is better** (wind, waves, swell height, gusts):
//!   `value ≤ safe` → Safe, `value ≤ caution` → Caution, else Unsafe
//! - **Higher is better** (swell period):
//!   `value ≥ safe` → Safe, `value ≥ caution` → Caution, else Unsafe
//!
//! The overall level is the worst individual level. The limiting factor is
//! the first metric (in evaluation order) sitting at that level.

use serde::{Deserialize, Serialize};

use crate::config::{MetricThreshold, Thresholds};
use crate::marine::MarineConditions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Safe,
    Caution,
    Unsafe,
}

impl SafetyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyLevel::Safe => "safe",
            SafetyLevel::Caution => "caution",
            SafetyLevel::Unsafe => "unsafe",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

/// One metric's verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorAssessment {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub status: SafetyLevel,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub overall: SafetyLevel,
    /// In evaluation order: wind, waves, swell, swell_period, gusts
    pub factors: Vec<FactorAssessment>,
    pub limiting_factor: Option<String>,
    pub details: String,
}

impl SafetyAssessment {
    pub fn factor(&self, name: &str) -> Option<&FactorAssessment> {
        self.factors.iter().find(|f| f.name == name)
    }
}

/// Values to judge. Absent metrics are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SafetyInputs {
    pub wind_speed_kt: Option<f64>,
    pub wave_height_m: Option<f64>,
    pub swell_height_m: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub wind_gust_kt: Option<f64>,
}

impl From<&MarineConditions> for SafetyInputs {
    fn from(m: &MarineConditions) -> Self {
        Self {
            wind_speed_kt: Some(m.wind_speed_kt),
            wave_height_m: Some(m.wave_height_m),
            swell_height_m: m.swell_height_m,
            swell_period_s: m.swell_period_s,
            wind_gust_kt: m.wind_gust_kt,
        }
    }
}

/// Judge a single value. A missing threshold means zero limits.
pub fn assess_metric(
    value: f64,
    threshold: Option<&MetricThreshold>,
    direction: Direction,
    unit: &str,
) -> (SafetyLevel, String) {
    let (safe, caution) = threshold.map_or((0.0, 0.0), |t| (t.safe, t.caution));
    match direction {
        Direction::LowerIsBetter if value <= safe => (
            SafetyLevel::Safe,
            format!("Excellent - well below {safe}{unit}"),
        ),
        Direction::LowerIsBetter if value <= caution => (
            SafetyLevel::Caution,
            format!("Moderate - between {safe}-{caution}{unit}"),
        ),
        Direction::LowerIsBetter => (
            SafetyLevel::Unsafe,
            format!("High - exceeds {caution}{unit}"),
        ),
        Direction::HigherIsBetter if value >= safe => (
            SafetyLevel::Safe,
            format!("Excellent - above {safe}{unit}"),
        ),
        Direction::HigherIsBetter if value >= caution => (
            SafetyLevel::Caution,
            format!("Moderate - between {caution}-{safe}{unit}"),
        ),
        Direction::HigherIsBetter => (
            SafetyLevel::Unsafe,
            format!("Low - below {caution}{unit}"),
        ),
    }
}

pub struct SafetyAssessor {
    thresholds: Thresholds,
}

impl SafetyAssessor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn assess(&self, inputs: &SafetyInputs) -> SafetyAssessment {
        use Direction::{HigherIsBetter, LowerIsBetter};

        let t = &self.thresholds;
        let checks = [
            ("wind", inputs.wind_speed_kt, t.wind_speed_kt.as_ref(), LowerIsBetter, "kt"),
            ("waves", inputs.wave_height_m, t.wave_height_m.as_ref(), LowerIsBetter, "m"),
            ("swell", inputs.swell_height_m, t.swell_height_m.as_ref(), LowerIsBetter, "m"),
            ("swell_period", inputs.swell_period_s, t.swell_period_s.as_ref(), HigherIsBetter, "s"),
            ("gusts", inputs.wind_gust_kt, t.wind_gust_kt.as_ref(), LowerIsBetter, "kt"),
        ];

        let factors: Vec<FactorAssessment> = checks
            .into_iter()
            .filter_map(|(name, value, threshold, direction, unit)| {
                let value = value?;
                let (status, message) = assess_metric(value, threshold, direction, unit);
                Some(FactorAssessment {
                    name: name.to_string(),
                    value,
                    unit: unit.to_string(),
                    status,
                    message,
                })
            })
            .collect();

        let overall = factors
            .iter()
            .map(|f| f.status)
            .max()
            .unwrap_or(SafetyLevel::Safe);
        let limiting = factors
            .iter()
            .find(|f| overall != SafetyLevel::Safe && f.status == overall);
        let details = details(overall, limiting);

        SafetyAssessment {
            overall,
            limiting_factor: limiting.map(|f| f.name.clone()),
            factors,
            details,
        }
    }
}

fn details(overall: SafetyLevel, limiting: Option<&FactorAssessment>) -> String {
    match (overall, limiting) {
        (SafetyLevel::Safe, _) => "All conditions are within safe limits for freediving.".into(),
        (SafetyLevel::Caution, Some(f)) => format!(
            "Caution advised due to {}: {}{} - {}",
            f.name, f.value, f.unit, f.message
        ),
        (SafetyLevel::Caution, None) => "Caution advised - some conditions are marginal.".into(),
        (SafetyLevel::Unsafe, Some(f)) => format!(
            "Unsafe conditions - {}: {}{} - {}",
            f.name, f.value, f.unit, f.message
        ),
        (SafetyLevel::Unsafe, None) => "Unsafe conditions detected.".into(),
    }
}
