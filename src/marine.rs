//! Open-Meteo marine and weather client.
//!
//! Two free endpoints, no API key:
//! - marine: `current=wave_height,wave_period,...` → waves and swell
//! - forecast: `current=temperature_2m,...&wind_speed_unit=kn` → wind in knots
//!
//! Timestamps are requested in GMT so they can be read as UTC.

use std::time::Duration as StdDuration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const MARINE_URL: &str = "https://marine-api.open-meteo.com/v1/marine";
pub const WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

const MARINE_FIELDS: &str = "wave_height,wave_period,wave_direction,\
    swell_wave_height,swell_wave_period,swell_wave_direction";
const WEATHER_FIELDS: &str =
    "temperature_2m,precipitation,cloud_cover,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

#[derive(Error, Debug)]
pub enum MarineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Open-Meteo returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected Open-Meteo response: {0}")]
    Parse(String),
}

impl MarineError {
    fn is_transient(&self) -> bool {
        match self {
            MarineError::Http(e) => !e.is_decode(),
            MarineError::Api { status, .. } => *status >= 500 || *status == 429,
            MarineError::Parse(_) => false,
        }
    }
}

/// Current sea state from the marine endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarineReading {
    pub wave_height_m: f64,
    pub wave_period_s: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub swell_height_m: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub swell_direction_deg: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Current weather from the forecast endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub wind_speed_kt: f64,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_kt: Option<f64>,
    pub precipitation_mm: f64,
    pub cloud_cover_pct: f64,
    pub temperature_c: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Marine and weather readings merged, as cached and displayed per spot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarineConditions {
    pub wave_height_m: f64,
    pub wave_period_s: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub swell_height_m: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub swell_direction_deg: Option<f64>,
    pub wind_speed_kt: f64,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_kt: Option<f64>,
    pub precipitation_mm: f64,
    pub cloud_cover_pct: f64,
    pub temperature_c: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MarineConditions {
    /// Weather timestamp wins when both are present.
    pub fn combine(marine: MarineReading, weather: WeatherReading) -> Self {
        Self {
            wave_height_m: marine.wave_height_m,
            wave_period_s: marine.wave_period_s,
            wave_direction_deg: marine.wave_direction_deg,
            swell_height_m: marine.swell_height_m,
            swell_period_s: marine.swell_period_s,
            swell_direction_deg: marine.swell_direction_deg,
            wind_speed_kt: weather.wind_speed_kt,
            wind_direction_deg: weather.wind_direction_deg,
            wind_gust_kt: weather.wind_gust_kt,
            precipitation_mm: weather.precipitation_mm,
            cloud_cover_pct: weather.cloud_cover_pct,
            temperature_c: weather.temperature_c,
            timestamp: weather.timestamp.or(marine.timestamp),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MarineCurrent {
    time: Option<String>,
    wave_height: Option<f64>,
    wave_period: Option<f64>,
    wave_direction: Option<f64>,
    swell_wave_height: Option<f64>,
    swell_wave_period: Option<f64>,
    swell_wave_direction: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    precipitation: Option<f64>,
    cloud_cover: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    current: Option<T>,
}

/// Open-Meteo returns `YYYY-MM-DDTHH:MM` without an offset.
fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|t| t.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
}

fn parse_marine(body: &str) -> Result<MarineReading, MarineError> {
    let envelope: Envelope<MarineCurrent> = serde_json::from_str(body)
        .map_err(|e| MarineError::Parse(e.to_string()))?;
    let c = envelope.current.unwrap_or_default();
    Ok(MarineReading {
        wave_height_m: c.wave_height.unwrap_or(0.0),
        wave_period_s: c.wave_period,
        wave_direction_deg: c.wave_direction,
        swell_height_m: c.swell_wave_height,
        swell_period_s: c.swell_wave_period,
        swell_direction_deg: c.swell_wave_direction,
        timestamp: parse_time(c.time.as_deref()),
    })
}

fn parse_weather(body: &str) -> Result<WeatherReading, MarineError> {
    let envelope: Envelope<WeatherCurrent> = serde_json::from_str(body)
        .map_err(|e| MarineError::Parse(e.to_string()))?;
    let c = envelope.current.unwrap_or_default();
    Ok(WeatherReading {
        wind_speed_kt: c.wind_speed_10m.unwrap_or(0.0),
        wind_direction_deg: c.wind_direction_10m,
        wind_gust_kt: c.wind_gusts_10m,
        precipitation_mm: c.precipitation.unwrap_or(0.0),
        cloud_cover_pct: c.cloud_cover.unwrap_or(0.0),
        temperature_c: c.temperature_2m,
        timestamp: parse_time(c.time.as_deref()),
    })
}

/// Client for both Open-Meteo endpoints.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    marine_url: String,
    weather_url: String,
    retry: ExponentialBuilder,
}

impl OpenMeteoClient {
    pub fn new(timeout: StdDuration) -> Result<Self, MarineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            marine_url: MARINE_URL.to_string(),
            weather_url: WEATHER_URL.to_string(),
            retry: crate::tide_data::default_retry(),
        })
    }

    pub fn with_base_urls(
        mut self,
        marine_url: impl Into<String>,
        weather_url: impl Into<String>,
    ) -> Self {
        self.marine_url = marine_url.into();
        self.weather_url = weather_url.into();
        self
    }

    async fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<String, MarineError> {
        debug!(%url, "requesting Open-Meteo");
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MarineError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        Ok(resp.text().await?)
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, MarineError> {
        let fetch = move || self.get_once(url, query);
        fetch
            .retry(&self.retry)
            .when(MarineError::is_transient)
            .notify(|err, delay| {
                warn!(error = %err, ?delay, "retrying Open-Meteo request");
            })
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_marine(&self, lat: f64, lng: f64) -> Result<MarineReading, MarineError> {
        let params = [
            ("latitude", lat.to_string()),
            ("longitude", lng.to_string()),
            ("current", MARINE_FIELDS.to_string()),
            ("timezone", "GMT".to_string()),
        ];
        let body = self.get_text(&self.marine_url, &params).await?;
        parse_marine(&body)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_weather(&self, lat: f64, lng: f64) -> Result<WeatherReading, MarineError> {
        let params = [
            ("latitude", lat.to_string()),
            ("longitude", lng.to_string()),
            ("current", WEATHER_FIELDS.to_string()),
            ("timezone", "GMT".to_string()),
            ("wind_speed_unit", "kn".to_string()),
        ];
        let body = self.get_text(&self.weather_url, &params).await?;
        parse_weather(&body)
    }

    /// Both endpoints, merged. Either one failing fails the whole reading.
    pub async fn fetch_combined(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<MarineConditions, MarineError> {
        let (marine, weather) = futures::try_join!(
            self.fetch_marine(lat, lng),
            self.fetch_weather(lat, lng)
        )?;
        Ok(MarineConditions::combine(marine, weather))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_marine_current_block() {
        let body = r#"{
            "latitude": 7.6, "longitude": 98.375,
            "current": {
                "time": "2025-03-01T06:00", "interval": 3600,
                "wave_height": 0.62, "wave_period": 5.1, "wave_direction": 240,
                "swell_wave_height": 0.4, "swell_wave_period": 9.8, "swell_wave_direction": 250
            }
        }"#;
        let m = parse_marine(body).unwrap();
        assert_eq!(m.wave_height_m, 0.62);
        assert_eq!(m.swell_period_s, Some(9.8));
        assert_eq!(m.wave_direction_deg, Some(240.0));
        assert_eq!(
            m.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap())
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let m = parse_marine(r#"{"current": {}}"#).unwrap();
        assert_eq!(m.wave_height_m, 0.0);
        assert!(m.swell_height_m.is_none());
        assert!(m.timestamp.is_none());

        let w = parse_weather(r#"{"latitude": 1.0}"#).unwrap();
        assert_eq!(w.wind_speed_kt, 0.0);
        assert_eq!(w.precipitation_mm, 0.0);
    }

    #[test]
    fn parses_weather_in_knots() {
        let body = r#"{"current": {
            "time": "2025-03-01T06:00", "temperature_2m": 29.4, "precipitation": 1.2,
            "cloud_cover": 40, "wind_speed_10m": 8.5, "wind_direction_10m": 45,
            "wind_gusts_10m": 14.0
        }}"#;
        let w = parse_weather(body).unwrap();
        assert_eq!(w.wind_speed_kt, 8.5);
        assert_eq!(w.wind_gust_kt, Some(14.0));
        assert_eq!(w.cloud_cover_pct, 40.0);
        assert_eq!(w.temperature_c, Some(29.4));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_marine("<html>"), Err(MarineError::Parse(_))));
    }

    #[test]
    fn combine_merges_both_readings() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let marine = MarineReading {
            wave_height_m: 1.1,
            swell_height_m: Some(0.8),
            timestamp: Some(t),
            ..Default::default()
        };
        let weather = WeatherReading {
            wind_speed_kt: 12.0,
            ..Default::default()
        };
        let c = MarineConditions::combine(marine, weather);
        assert_eq!(c.wave_height_m, 1.1);
        assert_eq!(c.swell_height_m, Some(0.8));
        assert_eq!(c.wind_speed_kt, 12.0);
        assert_eq!(c.timestamp, Some(t));
    }
}
