//! # Configuration Management
//!
//! This module handles loading and saving `dive-config.toml`: the list of dive
//! spots, the safety and visibility thresholds, tide API settings and the
//! cache location.
//!
//! A missing or invalid file never stops the program. It falls back to the
//! built-in defaults (a handful of Andaman Sea spots and conservative
//! freediving thresholds) and says so in the log.
//!
//! Two environment variables override the file:
//! - `STORMGLASS_API_KEY` → `tides.api_key`
//! - `CACHE_DIR` → `cache.dir`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PATH: &str = "dive-config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("spot '{0}' already exists")]
    DuplicateSpot(String),

    #[error("no spot named '{0}'")]
    UnknownSpot(String),

    #[error("coordinates out of range: lat {lat}, lng {lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
}

impl ConfigError {
    /// The file does not exist; other IO failures (permissions, ...) do not count.
    pub fn is_not_found(&self) -> bool {
        match self {
            ConfigError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Application configuration loaded from dive-config.toml
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub spots: Vec<DiveSpot>,
    pub thresholds: Thresholds,
    pub tides: TidesConfig,
    pub cache: CacheConfig,
}

/// A named dive site
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DiveSpot {
    pub name: String,
    /// Latitude in decimal degrees, -90..=90
    pub lat: f64,
    /// Longitude in decimal degrees, -180..=180
    pub lng: f64,
    #[serde(default)]
    pub region: String,
    /// Typical depth range, e.g. "5-40m"
    #[serde(default)]
    pub depth_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DiveSpot {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            region: String::new(),
            depth_range: String::new(),
            description: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_depth_range(mut self, depth_range: impl Into<String>) -> Self {
        self.depth_range = depth_range.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lat_ok = (-90.0..=90.0).contains(&self.lat);
        let lng_ok = (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidCoordinates {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

/// Safe / caution / unsafe limits for one marine metric.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct MetricThreshold {
    #[serde(default)]
    pub safe: f64,
    #[serde(default)]
    pub caution: f64,
    #[serde(rename = "unsafe", default = "default_unsafe")]
    pub unsafe_: f64,
}

fn default_unsafe() -> f64 {
    999.0
}

impl MetricThreshold {
    pub const fn new(safe: f64, caution: f64, unsafe_: f64) -> Self {
        Self {
            safe,
            caution,
            unsafe_,
        }
    }
}

/// Good / poor limits for one visibility indicator.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct IndicatorThreshold {
    pub good: f64,
    pub poor: f64,
}

impl IndicatorThreshold {
    pub const fn new(good: f64, poor: f64) -> Self {
        Self { good, poor }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct VisibilityThresholds {
    pub turbidity_fnu: IndicatorThreshold,
    pub rainfall_mm_3day: IndicatorThreshold,
    pub wind_avg_kt_5day: IndicatorThreshold,
}

impl Default for VisibilityThresholds {
    fn default() -> Self {
        Self {
            turbidity_fnu: IndicatorThreshold::new(2.0, 5.0),
            rainfall_mm_3day: IndicatorThreshold::new(10.0, 50.0),
            wind_avg_kt_5day: IndicatorThreshold::new(8.0, 15.0),
        }
    }
}

/// Safety limits per metric. A metric set to `None` is judged with zero limits.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub wind_speed_kt: Option<MetricThreshold>,
    pub wave_height_m: Option<MetricThreshold>,
    pub swell_height_m: Option<MetricThreshold>,
    /// Higher is better: long-period swell is smoother
    pub swell_period_s: Option<MetricThreshold>,
    pub wind_gust_kt: Option<MetricThreshold>,
    pub visibility: VisibilityThresholds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            wind_speed_kt: Some(MetricThreshold::new(10.0, 15.0, 20.0)),
            wave_height_m: Some(MetricThreshold::new(0.5, 1.0, 1.5)),
            swell_height_m: Some(MetricThreshold::new(1.0, 1.5, 2.0)),
            swell_period_s: Some(MetricThreshold::new(10.0, 7.0, 5.0)),
            wind_gust_kt: Some(MetricThreshold::new(15.0, 20.0, 25.0)),
            visibility: VisibilityThresholds::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TidesConfig {
    /// Days of tide data per request
    pub days: i64,
    /// Stormglass key; without one only the offline model is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// HTTP timeout for every external request
    pub timeout_secs: u64,
}

impl Default for TidesConfig {
    fn default() -> Self {
        Self {
            days: 7,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache"),
            enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            spots: vec![
                DiveSpot::new("Racha Yai", 7.601, 98.366)
                    .with_region("Phuket")
                    .with_depth_range("5-35m"),
                DiveSpot::new("Shark Point", 7.753, 98.472)
                    .with_region("Phuket")
                    .with_depth_range("8-24m"),
                DiveSpot::new("Koh Haa", 7.442, 98.906)
                    .with_region("Krabi")
                    .with_depth_range("5-30m"),
            ],
            thresholds: Thresholds::default(),
            tides: TidesConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from dive-config.toml
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_PATH)
    }

    /// Load configuration from the given path, then apply environment overrides.
    /// Falls back to the default configuration if the file doesn't exist or is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut config = match Self::try_load(path) {
            Ok(config) => {
                info!(path = %path.display(), spots = config.spots.len(), "loaded configuration");
                config
            }
            Err(e) if e.is_not_found() => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unusable config file, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    /// Strict load: any IO or parse problem is an error.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("STORMGLASS_API_KEY").ok(),
            std::env::var("CACHE_DIR").ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, cache_dir: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.tides.api_key = Some(key);
        }
        if let Some(dir) = cache_dir.filter(|d| !d.trim().is_empty()) {
            self.cache.dir = PathBuf::from(dir);
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }

    pub fn spot(&self, name: &str) -> Option<&DiveSpot> {
        self.spots
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Add a spot; names are unique (case-insensitive).
    pub fn add_spot(&mut self, spot: DiveSpot) -> Result<(), ConfigError> {
        spot.validate()?;
        if self.spot(&spot.name).is_some() {
            return Err(ConfigError::DuplicateSpot(spot.name));
        }
        self.spots.push(spot);
        Ok(())
    }

    pub fn remove_spot(&mut self, name: &str) -> Result<DiveSpot, ConfigError> {
        let idx = self
            .spots
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownSpot(name.to_string()))?;
        Ok(self.spots.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.spots.len(), 3);
        assert_eq!(config.tides.days, 7);
        assert_eq!(config.tides.timeout_secs, 30);
        assert!(config.cache.enabled);
        assert_eq!(
            config.thresholds.swell_period_s,
            Some(MetricThreshold::new(10.0, 7.0, 5.0))
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [[spots]]
            name = "Anita's Reef"
            lat = 8.65
            lng = 97.65

            [thresholds.wind_speed_kt]
            safe = 8
            caution = 12

            [tides]
            days = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.spots.len(), 1);
        assert_eq!(parsed.spots[0].region, "");
        let wind = parsed.thresholds.wind_speed_kt.unwrap();
        assert_eq!((wind.safe, wind.caution, wind.unsafe_), (8.0, 12.0, 999.0));
        assert_eq!(
            parsed.thresholds.wave_height_m,
            Thresholds::default().wave_height_m
        );
        assert_eq!(parsed.tides.days, 3);
        assert_eq!(parsed.tides.timeout_secs, 30);
        assert_eq!(parsed.cache, CacheConfig::default());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let parsed: Config = toml::from_str(include_str!("../dive-config.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.thresholds, defaults.thresholds);
        assert_eq!(parsed.tides, defaults.tides);
        assert_eq!(parsed.cache, defaults.cache);
        let names: Vec<_> = parsed.spots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Racha Yai", "Shark Point", "Koh Haa"]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        assert_eq!(config.spots, Config::default().spots);
    }

    #[test]
    fn test_only_missing_file_counts_as_absent() {
        let dir = TempDir::new().unwrap();
        let missing = Config::try_load(dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.is_not_found());

        // a directory is unreadable as a file but is not "no config"
        let unreadable = Config::try_load(dir.path()).unwrap_err();
        assert!(matches!(unreadable, ConfigError::Io(_)));
        assert!(!unreadable.is_not_found());
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dive-config.toml");
        fs::write(&path, "spots = 12").unwrap();
        assert!(Config::try_load(&path).is_err());
        let config = Config::load_from_path(&path);
        assert_eq!(config.spots, Config::default().spots);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dive-config.toml");
        let mut config = Config::default();
        let spot = DiveSpot::new("Hin Daeng", 7.149, 98.818).with_depth_range("10-60m");
        config.add_spot(spot).unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::try_load(&path).unwrap();
        assert_eq!(loaded.spots.len(), 4);
        assert_eq!(loaded.spot("hin daeng").unwrap().depth_range, "10-60m");
    }

    #[test]
    fn test_add_spot_validation() {
        let mut config = Config::default();
        assert!(matches!(
            config.add_spot(DiveSpot::new("racha yai", 1.0, 1.0)),
            Err(ConfigError::DuplicateSpot(_))
        ));
        assert!(matches!(
            config.add_spot(DiveSpot::new("North Pole", 91.0, 0.0)),
            Err(ConfigError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            config.add_spot(DiveSpot::new("Date Line", 0.0, -180.5)),
            Err(ConfigError::InvalidCoordinates { .. })
        ));
        assert_eq!(config.spots.len(), 3);
    }

    #[test]
    fn test_remove_spot() {
        let mut config = Config::default();
        let removed = config.remove_spot("Shark Point").unwrap();
        assert_eq!(removed.lat, 7.753);
        assert_eq!(config.spots.len(), 2);
        assert!(matches!(
            config.remove_spot("Shark Point"),
            Err(ConfigError::UnknownSpot(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("secret".into()), Some("/var/cache/dive".into()));
        assert_eq!(config.tides.api_key.as_deref(), Some("secret"));
        assert_eq!(config.cache.dir, PathBuf::from("/var/cache/dive"));

        // blank values are ignored
        let mut config = Config::default();
        config.apply_overrides(Some("  ".into()), Some(String::new()));
        assert!(config.tides.api_key.is_none());
        assert_eq!(config.cache.dir, PathBuf::from(".cache"));
    }
}
