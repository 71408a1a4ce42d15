//! # Conditions Aggregator
//!
//! Combines every data source into one [`FullConditions`] per dive spot:
//!
//! 1. Marine weather (Open-Meteo), cache first
//! 2. Tides ([`TidePredictionService`]), cache first for API data
//! 3. Turbidity, when a source is configured
//! 4. Safety and visibility, derived from the marine reading
//!
//! Sources fail independently. A failure lands in [`Metadata`] and the
//! matching field stays `None`; it never fails the whole spot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{DataCache, DataKind};
use crate::config::{DiveSpot, Thresholds};
use crate::extrema::{current_tide, next_high_low};
use crate::marine::{MarineConditions, MarineError, OpenMeteoClient};
use crate::safety::{SafetyAssessment, SafetyAssessor, SafetyInputs};
use crate::tide_data::TidePredictionService;
use crate::visibility::{VisibilityEstimate, VisibilityEstimator, VisibilityInputs};
use crate::{HourlyHeightSeries, TideExtreme, TidePredictionResult, TideSource};

/// How many extremes a spot keeps (about a week of semidiurnal tides).
pub const MAX_EXTREMES: usize = 14;

#[async_trait]
pub trait MarineSource: Send + Sync {
    async fn fetch(&self, lat: f64, lng: f64) -> Result<MarineConditions, MarineError>;
}

#[async_trait]
impl MarineSource for OpenMeteoClient {
    async fn fetch(&self, lat: f64, lng: f64) -> Result<MarineConditions, MarineError> {
        self.fetch_combined(lat, lng).await
    }
}

/// Satellite turbidity in FNU. `Ok(None)` means no usable pixel (clouds, gaps).
#[async_trait]
pub trait TurbiditySource: Send + Sync {
    async fn fetch_turbidity(&self, lat: f64, lng: f64) -> anyhow::Result<Option<f64>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Fetched,
    Cached,
    Failed,
    NoData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Per source ("marine", "tides", "turbidity")
    pub status: BTreeMap<String, FetchStatus>,
    pub errors: BTreeMap<String, String>,
    pub time_to_next_high_minutes: Option<i64>,
    pub wind_speed_beaufort: Option<u8>,
}

impl Metadata {
    fn record(&mut self, source: &str, status: FetchStatus) {
        self.status.insert(source.to_string(), status);
    }

    fn fail(&mut self, source: &str, error: impl ToString) {
        self.status.insert(source.to_string(), FetchStatus::Failed);
        self.errors.insert(source.to_string(), error.to_string());
    }
}

/// Tide state for one spot at the time of the fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideConditions {
    pub extremes: Vec<TideExtreme>,
    pub hourly_heights: HourlyHeightSeries,
    pub current_height_m: Option<f64>,
    pub is_rising: Option<bool>,
    pub next_high: Option<TideExtreme>,
    pub next_low: Option<TideExtreme>,
    pub source: TideSource,
    pub fetched_at: DateTime<Utc>,
}

impl TideConditions {
    pub fn from_prediction(prediction: TidePredictionResult, now: DateTime<Utc>) -> Self {
        let current = current_tide(&prediction.hourly_heights, now);
        let (next_high, next_low) = next_high_low(&prediction.extremes, now);
        let mut extremes = prediction.extremes;
        extremes.truncate(MAX_EXTREMES);
        Self {
            extremes,
            hourly_heights: prediction.hourly_heights,
            current_height_m: current.height_m,
            is_rising: current.is_rising,
            next_high,
            next_low,
            source: prediction.source,
            fetched_at: prediction.fetched_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FullConditions {
    pub spot: DiveSpot,
    pub marine: Option<MarineConditions>,
    pub tides: Option<TideConditions>,
    pub visibility: Option<VisibilityEstimate>,
    pub safety: Option<SafetyAssessment>,
    pub metadata: Metadata,
    pub fetched_at: DateTime<Utc>,
}

/// Wind in knots to the Beaufort number (0-12).
pub fn beaufort(wind_kt: f64) -> u8 {
    const UPPER_BOUNDS: [f64; 12] = [
        1.0, 4.0, 7.0, 11.0, 16.0, 22.0, 28.0, 34.0, 41.0, 48.0, 56.0, 64.0,
    ];
    UPPER_BOUNDS
        .iter()
        .position(|&upper| wind_kt < upper)
        .unwrap_or(UPPER_BOUNDS.len()) as u8
}

pub struct ConditionsAggregator {
    marine: Box<dyn MarineSource>,
    tides: TidePredictionService,
    turbidity: Option<Box<dyn TurbiditySource>>,
    cache: Option<DataCache>,
    safety: SafetyAssessor,
    visibility: VisibilityEstimator,
    tide_days: i64,
}

impl ConditionsAggregator {
    pub fn new(
        marine: Box<dyn MarineSource>,
        tides: TidePredictionService,
        thresholds: Thresholds,
        tide_days: i64,
    ) -> Self {
        let visibility = VisibilityEstimator::new(thresholds.visibility.clone());
        Self {
            marine,
            tides,
            turbidity: None,
            cache: None,
            safety: SafetyAssessor::new(thresholds),
            visibility,
            tide_days,
        }
    }

    pub fn with_cache(mut self, cache: DataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_turbidity(mut self, source: Box<dyn TurbiditySource>) -> Self {
        self.turbidity = Some(source);
        self
    }

    /// Conditions for every spot, fetched concurrently, in input order.
    pub async fn fetch_all(&self, spots: &[DiveSpot]) -> Vec<FullConditions> {
        let now = Utc::now();
        let fetches = spots
            .iter()
            .map(|spot| self.fetch_spot_conditions_at(spot, now));
        join_all(fetches).await
    }

    pub async fn fetch_spot_conditions(&self, spot: &DiveSpot) -> FullConditions {
        self.fetch_spot_conditions_at(spot, Utc::now()).await
    }

    #[tracing::instrument(level = "debug", skip(self, spot), fields(spot = %spot.name))]
    pub async fn fetch_spot_conditions_at(
        &self,
        spot: &DiveSpot,
        now: DateTime<Utc>,
    ) -> FullConditions {
        let mut metadata = Metadata::default();

        let (marine, tides, turbidity) = futures::join!(
            self.marine_for(spot),
            self.tides_for(spot, now),
            self.turbidity_for(spot),
        );

        let marine = match marine {
            Ok((m, status)) => {
                metadata.record("marine", status);
                Some(m)
            }
            Err(e) => {
                warn!(spot = %spot.name, error = %e, "marine data unavailable");
                metadata.fail("marine", e);
                None
            }
        };

        let tides = match tides {
            Ok((prediction, status)) => {
                metadata.record("tides", status);
                Some(TideConditions::from_prediction(prediction, now))
            }
            Err(e) => {
                warn!(spot = %spot.name, error = %e, "tide data unavailable");
                metadata.fail("tides", e);
                None
            }
        };

        let turbidity = match turbidity {
            None => None,
            Some(Ok((value, status))) => {
                metadata.record("turbidity", status);
                value
            }
            Some(Err(e)) => {
                metadata.fail("turbidity", e);
                None
            }
        };

        let safety = marine
            .as_ref()
            .map(|m| self.safety.assess(&SafetyInputs::from(m)));

        let visibility = marine.as_ref().map(|m| {
            self.visibility.estimate(&VisibilityInputs {
                turbidity_fnu: turbidity,
                // rough 3-day total from the current rate
                recent_rainfall_mm: m.precipitation_mm * 3.0,
                avg_wind_speed_kt: m.wind_speed_kt,
                swell_height_m: m.swell_height_m.unwrap_or(0.0),
            })
        });

        metadata.time_to_next_high_minutes = tides
            .as_ref()
            .and_then(|t| t.next_high)
            .map(|high| (high.time - now).num_minutes());
        metadata.wind_speed_beaufort = marine.as_ref().map(|m| beaufort(m.wind_speed_kt));

        info!(
            spot = %spot.name,
            safety = safety.as_ref().map(|s| s.overall.as_str()).unwrap_or("unknown"),
            tide_source = tides.as_ref().map(|t| t.source.as_str()).unwrap_or("none"),
            "conditions ready"
        );

        FullConditions {
            spot: spot.clone(),
            marine,
            tides,
            visibility,
            safety,
            metadata,
            fetched_at: now,
        }
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, kind: DataKind, spot: &DiveSpot) -> Option<T> {
        self.cache.as_ref()?.get(kind, spot.lat, spot.lng)
    }

    fn store<T: Serialize>(&self, kind: DataKind, spot: &DiveSpot, value: &T) {
        if let Some(cache) = &self.cache {
            cache.put_quietly(kind, spot.lat, spot.lng, value);
        }
    }

    async fn marine_for(
        &self,
        spot: &DiveSpot,
    ) -> Result<(MarineConditions, FetchStatus), MarineError> {
        if let Some(m) = self.cached(DataKind::Marine, spot) {
            return Ok((m, FetchStatus::Cached));
        }
        let m = self.marine.fetch(spot.lat, spot.lng).await?;
        self.store(DataKind::Marine, spot, &m);
        Ok((m, FetchStatus::Fetched))
    }

    async fn tides_for(
        &self,
        spot: &DiveSpot,
        now: DateTime<Utc>,
    ) -> Result<(TidePredictionResult, FetchStatus), crate::tide_data::TideError> {
        if let Some(cached) = self.cached::<TidePredictionResult>(DataKind::Tides, spot) {
            debug!(spot = %spot.name, "using cached tides");
            return Ok((cached, FetchStatus::Cached));
        }
        let prediction = self
            .tides
            .predict_at(spot.lat, spot.lng, self.tide_days, now)
            .await?;
        // offline predictions are cheap and should not mask a recovered API
        if prediction.source == TideSource::Api {
            self.store(DataKind::Tides, spot, &prediction);
        }
        Ok((prediction, FetchStatus::Fetched))
    }

    async fn turbidity_for(
        &self,
        spot: &DiveSpot,
    ) -> Option<anyhow::Result<(Option<f64>, FetchStatus)>> {
        let source = self.turbidity.as_ref()?;
        if let Some(value) = self.cached::<f64>(DataKind::Turbidity, spot) {
            return Some(Ok((Some(value), FetchStatus::Cached)));
        }
        let fetched = source.fetch_turbidity(spot.lat, spot.lng).await;
        Some(fetched.map(|value| match value {
            Some(v) => {
                self.store(DataKind::Turbidity, spot, &v);
                (Some(v), FetchStatus::Fetched)
            }
            None => (None, FetchStatus::NoData),
        }))
    }
}
