//! # Tide Data Fetching with Harmonic Fallback
//!
//! This module answers "give me N days of tide data for (lat, lng)". It tries
//! an external tide API first and falls back to the offline harmonic model in
//! [`crate::fallback`] when the API is not configured or fails.
//!
//! ## Data Source
//!
//! ### Stormglass
//! - **URL**: https://api.stormglass.io/v2
//! - **Extremes**: `GET /tide/extremes/point` → `data[] { time, height, type }`
//! - **Sea level**: `GET /tide/sea-level/point` → `data[] { time, sg }` (hourly)
//! - **Auth**: API key in the `Authorization` header
//!
//! ### Decision Flow
//! 1. **No API configured** → harmonic
//! 2. **API configured** → fetch with retry (3 attempts, exponential backoff)
//! 3. **API failed** → log a warning, harmonic
//! 4. **API succeeded** → result tagged `source = api`
//!
//! The API leg and the harmonic leg never run concurrently for one request.
//!
//! ## Error Handling
//!
//! [`TideError`] covers the whole tide pipeline. Only
//! [`TideError::InvalidInput`] ever reaches callers of
//! [`TidePredictionService::predict`]; every API error is absorbed by the
//! fallback and shows up as `source = harmonic`.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fallback;
use crate::{
    HeightSample, HourlyHeightSeries, TideExtreme, TideKind, TidePredictionResult, TideSource,
};

/// Errors that can occur while producing tide data.
#[derive(Error, Debug)]
pub enum TideError {
    /// Caller misuse: non-positive days, malformed series, unknown constituent
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed (network, timeout, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("tide API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// API answered with data we could not use
    #[error("unexpected tide API response: {0}")]
    Parse(String),

    /// No API key was provided for the external source
    #[error("STORMGLASS_API_KEY is not set")]
    MissingApiKey,
}

impl TideError {
    /// Transport failures and server errors are worth another attempt.
    fn is_transient(&self) -> bool {
        match self {
            TideError::Http(e) => !e.is_decode(),
            TideError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Extremes and hourly heights as delivered by an external tide source.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiTides {
    pub extremes: Vec<TideExtreme>,
    pub hourly_heights: HourlyHeightSeries,
}

/// An external tide-data provider.
#[async_trait]
pub trait TideApi: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// `days` of data starting at `start`.
    async fn fetch(
        &self,
        lat: f64,
        lng: f64,
        days: i64,
        start: DateTime<Utc>,
    ) -> Result<ApiTides, TideError>;
}

/// Outcome of the external attempt, kept explicit so the fallback branch is visible.
#[derive(Debug)]
pub enum ApiAttempt {
    /// No external source configured
    Skipped,
    Failed(TideError),
    Fetched(ApiTides),
}

/// Orchestrates the external tide API and the harmonic fallback.
///
/// # Example
/// ```no_run
/// use dive_tracker_lib::tide_data::TidePredictionService;
///
/// # async fn run() -> Result<(), dive_tracker_lib::tide_data::TideError> {
/// let service = TidePredictionService::offline();
/// let tides = service.predict(7.601, 98.366, 7).await?;
/// println!("{} extremes from {}", tides.extremes.len(), tides.source.as_str());
/// # Ok(())
/// # }
/// ```
pub struct TidePredictionService {
    api: Option<Box<dyn TideApi>>,
}

impl TidePredictionService {
    pub fn new(api: Option<Box<dyn TideApi>>) -> Self {
        Self { api }
    }

    /// Harmonic model only.
    pub fn offline() -> Self {
        Self { api: None }
    }

    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    /// Tide data for `days` days starting now.
    ///
    /// # Errors
    /// Only [`TideError::InvalidInput`] (e.g. `days <= 0`).
    pub async fn predict(
        &self,
        lat: f64,
        lng: f64,
        days: i64,
    ) -> Result<TidePredictionResult, TideError> {
        self.predict_at(lat, lng, days, Utc::now()).await
    }

    /// Like [`predict`](Self::predict) with an explicit "now".
    pub async fn predict_at(
        &self,
        lat: f64,
        lng: f64,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<TidePredictionResult, TideError> {
        fallback::validate_days(days)?;

        match self.attempt_api(lat, lng, days, now).await {
            ApiAttempt::Fetched(tides) => Ok(TidePredictionResult {
                extremes: tides.extremes,
                hourly_heights: tides.hourly_heights,
                fetched_at: now,
                source: TideSource::Api,
            }),
            ApiAttempt::Failed(err) => {
                warn!(error = %err, lat, lng, "tide API failed, using harmonic fallback");
                fallback::approximate(lat, lng, days, Some(now))
            }
            ApiAttempt::Skipped => {
                debug!(lat, lng, "no tide API configured, using harmonic model");
                fallback::approximate(lat, lng, days, Some(now))
            }
        }
    }

    /// Try the external source once (its own retries included).
    pub async fn attempt_api(
        &self,
        lat: f64,
        lng: f64,
        days: i64,
        start: DateTime<Utc>,
    ) -> ApiAttempt {
        let Some(api) = &self.api else {
            return ApiAttempt::Skipped;
        };
        match api.fetch(lat, lng, days, start).await {
            Ok(tides) => {
                info!(
                    provider = api.name(),
                    extremes = tides.extremes.len(),
                    samples = tides.hourly_heights.len(),
                    "fetched tides"
                );
                ApiAttempt::Fetched(tides)
            }
            Err(err) => ApiAttempt::Failed(err),
        }
    }
}

// -- Stormglass client --

const STORMGLASS_URL: &str = "https://api.stormglass.io/v2";

#[derive(Debug, Deserialize)]
struct StormglassResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StormglassExtreme {
    time: DateTime<Utc>,
    height: f64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct StormglassSeaLevel {
    time: DateTime<Utc>,
    sg: f64,
}

/// Stormglass.io tide client.
pub struct StormglassClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: ExponentialBuilder,
}

impl StormglassClient {
    pub fn new(api_key: impl Into<String>, timeout: StdDuration) -> Result<Self, TideError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TideError::MissingApiKey);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: STORMGLASS_URL.to_string(),
            retry: default_retry(),
        })
    }

    /// Point the client at another server (used for staging and tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_once<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, TideError> {
        debug!(%url, "requesting Stormglass");
        let resp = self
            .client
            .get(url)
            .header("Authorization", &self.api_key)
            .query(query)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TideError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        let body = resp.text().await?;
        let parsed: StormglassResponse<T> = serde_json::from_str(&body)
            .map_err(|e| TideError::Parse(format!("Stormglass body: {e}")))?;
        Ok(parsed.data)
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        lat: f64,
        lng: f64,
        start: &str,
        end: &str,
    ) -> Result<Vec<T>, TideError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let query = [
            ("lat", lat.to_string()),
            ("lng", lng.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ];
        let (url, query) = (url.as_str(), query.as_slice());

        let fetch = move || self.get_once::<T>(url, query);
        fetch
            .retry(&self.retry)
            .when(TideError::is_transient)
            .notify(|err, delay| {
                warn!(error = %err, ?delay, "retrying Stormglass request");
            })
            .await
    }
}

/// 3 attempts, 2–10 s exponential backoff.
pub fn default_retry() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(StdDuration::from_secs(2))
        .with_max_delay(StdDuration::from_secs(10))
        .with_max_times(2)
}

#[async_trait]
impl TideApi for StormglassClient {
    fn name(&self) -> &str {
        "stormglass"
    }

    #[tracing::instrument(name = "stormglass_fetch", level = "debug", skip(self))]
    async fn fetch(
        &self,
        lat: f64,
        lng: f64,
        days: i64,
        start: DateTime<Utc>,
    ) -> Result<ApiTides, TideError> {
        let end = start + Duration::days(days);
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let extremes: Vec<StormglassExtreme> = self
            .get_data("tide/extremes/point", lat, lng, &start, &end)
            .await?;
        let sea_level: Vec<StormglassSeaLevel> = self
            .get_data("tide/sea-level/point", lat, lng, &start, &end)
            .await?;

        parse_stormglass(extremes, sea_level)
    }
}

fn parse_kind(raw: &str) -> Result<TideKind, TideError> {
    match raw.to_ascii_lowercase().as_str() {
        "high" => Ok(TideKind::High),
        "low" => Ok(TideKind::Low),
        other => Err(TideError::Parse(format!("unknown extreme type '{other}'"))),
    }
}

fn parse_stormglass(
    extremes: Vec<StormglassExtreme>,
    sea_level: Vec<StormglassSeaLevel>,
) -> Result<ApiTides, TideError> {
    let extremes = extremes
        .into_iter()
        .map(|e| {
            Ok(TideExtreme {
                time: e.time,
                height_m: e.height,
                kind: parse_kind(&e.kind)?,
            })
        })
        .collect::<Result<Vec<_>, TideError>>()?;

    let samples = sea_level
        .into_iter()
        .map(|s| HeightSample {
            time: s.time,
            height_m: s.sg,
        })
        .collect();
    let hourly_heights = HourlyHeightSeries::new(samples)
        .map_err(|e| TideError::Parse(format!("sea-level series: {e}")))?;

    if hourly_heights.is_empty() {
        return Err(TideError::Parse("no sea-level data".into()));
    }

    Ok(ApiTides {
        extremes,
        hourly_heights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn extremes_json() -> &'static str {
        r#"{"data": [
            {"time": "2025-03-01T03:12:00+00:00", "height": 1.1, "type": "high"},
            {"time": "2025-03-01T09:30:00+00:00", "height": -0.9, "type": "low"}
        ], "meta": {"cost": 1}}"#
    }

    fn sea_level_json() -> &'static str {
        r#"{"data": [
            {"time": "2025-03-01T00:00:00+00:00", "sg": 0.2},
            {"time": "2025-03-01T01:00:00+00:00", "sg": 0.6},
            {"time": "2025-03-01T02:00:00+00:00", "sg": 0.9}
        ]}"#
    }

    #[test]
    fn parses_stormglass_payloads() {
        let ext: StormglassResponse<StormglassExtreme> =
            serde_json::from_str(extremes_json()).unwrap();
        let sea: StormglassResponse<StormglassSeaLevel> =
            serde_json::from_str(sea_level_json()).unwrap();

        let tides = parse_stormglass(ext.data, sea.data).unwrap();
        assert_eq!(tides.extremes.len(), 2);
        assert_eq!(tides.extremes[0].kind, TideKind::High);
        assert_eq!(tides.extremes[1].kind, TideKind::Low);
        assert_eq!(
            tides.extremes[0].time,
            Utc.with_ymd_and_hms(2025, 3, 1, 3, 12, 0).unwrap()
        );
        assert_eq!(tides.hourly_heights.len(), 3);
    }

    #[test]
    fn missing_data_field_is_empty() {
        let sea: StormglassResponse<StormglassSeaLevel> =
            serde_json::from_str(r#"{"errors": {"key": "invalid"}}"#).unwrap();
        assert!(sea.data.is_empty());
        let err = parse_stormglass(vec![], sea.data).unwrap_err();
        assert!(matches!(err, TideError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_extreme_type() {
        let ext = vec![StormglassExtreme {
            time: Utc::now(),
            height: 1.0,
            kind: "slack".into(),
        }];
        let sea: StormglassResponse<StormglassSeaLevel> =
            serde_json::from_str(sea_level_json()).unwrap();
        assert!(matches!(
            parse_stormglass(ext, sea.data),
            Err(TideError::Parse(_))
        ));
    }

    #[test]
    fn rejects_unordered_sea_level() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let sea = vec![
            StormglassSeaLevel {
                time: t + Duration::hours(1),
                sg: 0.1,
            },
            StormglassSeaLevel { time: t, sg: 0.2 },
        ];
        assert!(matches!(
            parse_stormglass(vec![], sea),
            Err(TideError::Parse(_))
        ));
    }

    #[test]
    fn extreme_kind_is_case_insensitive() {
        assert_eq!(parse_kind("HIGH").unwrap(), TideKind::High);
        assert_eq!(parse_kind("Low").unwrap(), TideKind::Low);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = StormglassClient::new("  ", StdDuration::from_secs(5)).err();
        assert!(matches!(err, Some(TideError::MissingApiKey)));
    }

    /// Answers every connection with the same canned response and counts them.
    fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/html\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn test_client(base_url: &str) -> StormglassClient {
        let mut client = StormglassClient::new("key", StdDuration::from_secs(5))
            .unwrap()
            .with_base_url(base_url);
        client.retry = ExponentialBuilder::default()
            .with_min_delay(StdDuration::from_millis(1))
            .with_max_delay(StdDuration::from_millis(5))
            .with_max_times(2);
        client
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let (url, hits) = serve("200 OK", "<html>maintenance</html>");
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let err = test_client(&url)
            .fetch(7.6, 98.37, 1, start)
            .await
            .unwrap_err();
        assert!(matches!(err, TideError::Parse(_)), "got {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let (url, hits) = serve("503 Service Unavailable", "busy");
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let err = test_client(&url)
            .fetch(7.6, 98.37, 1, start)
            .await
            .unwrap_err();
        assert!(
            matches!(err, TideError::Api { status: 503, .. }),
            "got {err:?}"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn transient_errors() {
        let api = |status| TideError::Api {
            status,
            body: String::new(),
        };
        assert!(api(503).is_transient());
        assert!(api(429).is_transient());
        assert!(!api(401).is_transient());
        assert!(!TideError::Parse("x".into()).is_transient());
    }
}
