//! Underwater visibility estimate from proxy indicators.
//!
//! Nothing here measures visibility. Turbidity (when a satellite reading is
//! available), recent rain, wind and swell each score 3 (favorable), 2
//! (moderate) or 1 (unfavorable); the mean score picks the level.

use serde::{Deserialize, Serialize};

use crate::config::{IndicatorThreshold, VisibilityThresholds};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityLevel {
    Good,
    Mixed,
    Poor,
}

impl VisibilityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityLevel::Good => "good",
            VisibilityLevel::Mixed => "mixed",
            VisibilityLevel::Poor => "poor",
        }
    }

    pub fn range_estimate(self) -> &'static str {
        match self {
            VisibilityLevel::Good => "20-30m",
            VisibilityLevel::Mixed => "10-20m",
            VisibilityLevel::Poor => "<10m",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorStatus {
    Favorable,
    Moderate,
    Unfavorable,
}

impl IndicatorStatus {
    pub fn score(self) -> u8 {
        match self {
            IndicatorStatus::Favorable => 3,
            IndicatorStatus::Moderate => 2,
            IndicatorStatus::Unfavorable => 1,
        }
    }

    fn from_limits(value: f64, good: f64, poor: f64) -> Self {
        if value <= good {
            IndicatorStatus::Favorable
        } else if value <= poor {
            IndicatorStatus::Moderate
        } else {
            IndicatorStatus::Unfavorable
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: f64,
    pub status: IndicatorStatus,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityEstimate {
    pub level: VisibilityLevel,
    pub confidence: Confidence,
    pub range_estimate: String,
    pub indicators: Vec<Indicator>,
    pub notes: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisibilityInputs {
    pub turbidity_fnu: Option<f64>,
    /// Rain over the last 3 days
    pub recent_rainfall_mm: f64,
    /// 5-day average wind
    pub avg_wind_speed_kt: f64,
    pub swell_height_m: f64,
}

// Swell limits are fixed, not configurable.
const SWELL_CALM_M: f64 = 0.5;
const SWELL_ROUGH_M: f64 = 1.5;

pub struct VisibilityEstimator {
    thresholds: VisibilityThresholds,
}

impl VisibilityEstimator {
    pub fn new(thresholds: VisibilityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn estimate(&self, inputs: &VisibilityInputs) -> VisibilityEstimate {
        let t = &self.thresholds;
        let mut indicators = Vec::with_capacity(4);

        if let Some(fnu) = inputs.turbidity_fnu {
            indicators.push(turbidity(fnu, &t.turbidity_fnu));
        }
        indicators.push(rainfall(inputs.recent_rainfall_mm, &t.rainfall_mm_3day));
        indicators.push(wind(inputs.avg_wind_speed_kt, &t.wind_avg_kt_5day));
        indicators.push(swell(inputs.swell_height_m));

        let total: u32 = indicators.iter().map(|i| u32::from(i.status.score())).sum();
        let mean = f64::from(total) / indicators.len() as f64;
        let level = if mean >= 2.5 {
            VisibilityLevel::Good
        } else if mean >= 1.5 {
            VisibilityLevel::Mixed
        } else {
            VisibilityLevel::Poor
        };

        let favorable = indicators
            .iter()
            .filter(|i| i.status == IndicatorStatus::Favorable)
            .count();
        let has_turbidity = inputs.turbidity_fnu.is_some();
        let confidence = match (has_turbidity, favorable) {
            (true, n) if n >= 3 => Confidence::High,
            (true, _) => Confidence::Medium,
            (false, n) if n >= 2 => Confidence::Medium,
            (false, _) => Confidence::Low,
        };

        VisibilityEstimate {
            level,
            confidence,
            range_estimate: level.range_estimate().to_string(),
            indicators,
            notes: notes(has_turbidity, confidence),
        }
    }
}

fn turbidity(fnu: f64, limits: &IndicatorThreshold) -> Indicator {
    let status = IndicatorStatus::from_limits(fnu, limits.good, limits.poor);
    let message = match status {
        IndicatorStatus::Favorable => format!("Low turbidity ({fnu:.2} FNU) - clear water"),
        IndicatorStatus::Moderate => format!("Moderate turbidity ({fnu:.2} FNU)"),
        IndicatorStatus::Unfavorable => format!("High turbidity ({fnu:.2} FNU) - murky water"),
    };
    Indicator {
        name: "turbidity".into(),
        value: fnu,
        status,
        message,
    }
}

fn rainfall(mm: f64, limits: &IndicatorThreshold) -> Indicator {
    let status = IndicatorStatus::from_limits(mm, limits.good, limits.poor);
    let message = match status {
        IndicatorStatus::Favorable => format!("Minimal rain ({mm:.1}mm) - no runoff impact"),
        IndicatorStatus::Moderate => format!("Moderate rain ({mm:.1}mm) - some runoff"),
        IndicatorStatus::Unfavorable => format!("Heavy rain ({mm:.1}mm) - significant runoff"),
    };
    Indicator {
        name: "rainfall".into(),
        value: mm,
        status,
        message,
    }
}

fn wind(kt: f64, limits: &IndicatorThreshold) -> Indicator {
    let status = IndicatorStatus::from_limits(kt, limits.good, limits.poor);
    let message = match status {
        IndicatorStatus::Favorable => format!("Calm conditions ({kt:.1}kt avg) - settled sediment"),
        IndicatorStatus::Moderate => format!("Moderate wind ({kt:.1}kt avg) - some disturbance"),
        IndicatorStatus::Unfavorable => format!("Strong wind ({kt:.1}kt avg) - churned sediment"),
    };
    Indicator {
        name: "wind".into(),
        value: kt,
        status,
        message,
    }
}

fn swell(m: f64) -> Indicator {
    let status = IndicatorStatus::from_limits(m, SWELL_CALM_M, SWELL_ROUGH_M);
    let message = match status {
        IndicatorStatus::Favorable => format!("Calm seas ({m:.1}m) - minimal disturbance"),
        IndicatorStatus::Moderate => format!("Moderate swell ({m:.1}m)"),
        IndicatorStatus::Unfavorable => format!("Rough seas ({m:.1}m) - disturbed conditions"),
    };
    Indicator {
        name: "swell".into(),
        value: m,
        status,
        message,
    }
}

fn notes(has_turbidity: bool, confidence: Confidence) -> String {
    let mut notes = Vec::new();
    if !has_turbidity {
        notes.push("No satellite turbidity data available (cloud cover or data gap)");
    }
    notes.push("Estimate based on weather and sea state proxies - not direct measurement");
    if confidence == Confidence::Low {
        notes.push("Low confidence - recommend checking local dive reports for actual visibility");
    }
    format!("{}.", notes.join(". "))
}
