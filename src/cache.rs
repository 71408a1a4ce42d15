//! # File-Backed TTL Cache
//!
//! Fetched data is kept as one JSON file per `(kind, location)`:
//!
//! ```text
//! .cache/
//!   tides_7.601_98.366.json
//!   marine_7.601_98.366.json
//! ```
//!
//! Coordinates are rounded to 3 decimals (~100 m) so nearby lookups share an
//! entry. Freshness is judged from the file modification time against the TTL
//! of the data kind:
//!
//! | kind | TTL |
//! |---|---|
//! | marine | 30 min |
//! | tides | 12 h |
//! | turbidity | 6 h |
//!
//! A cache problem is never a request problem: reads that fail count as misses
//! and writes that fail are logged and dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO: {0}")]
    Io(#[from] io::Error),

    #[error("cache serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("entry is {age:?} old, older than {ttl:?}")]
    Stale { age: Duration, ttl: Duration },
}

/// What is being cached; decides the TTL and the file prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Marine,
    Tides,
    Turbidity,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Marine, DataKind::Tides, DataKind::Turbidity];

    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Marine => "marine",
            DataKind::Tides => "tides",
            DataKind::Turbidity => "turbidity",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            DataKind::Marine => Duration::from_secs(30 * 60),
            DataKind::Tides => Duration::from_secs(12 * 60 * 60),
            DataKind::Turbidity => Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// JSON files under one directory, expired by mtime.
#[derive(Clone, Debug)]
pub struct DataCache {
    dir: PathBuf,
}

impl DataCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for an entry, e.g. `tides_7.601_98.366.json`.
    pub fn key(kind: DataKind, lat: f64, lng: f64) -> String {
        format!("{}_{:.3}_{:.3}.json", kind.as_str(), lat, lng)
    }

    fn path(&self, kind: DataKind, lat: f64, lng: f64) -> PathBuf {
        self.dir.join(Self::key(kind, lat, lng))
    }

    /// Fresh cached value, or `None` when missing, expired or unreadable.
    pub fn get<T: DeserializeOwned>(&self, kind: DataKind, lat: f64, lng: f64) -> Option<T> {
        let path = self.path(kind, lat, lng);
        match self.load(&path, kind.ttl()) {
            Ok(value) => {
                debug!(path = %path.display(), "cache hit");
                Some(value)
            }
            Err(e) => {
                debug!(path = %path.display(), reason = %e, "cache miss");
                None
            }
        }
    }

    fn load<T: DeserializeOwned>(&self, path: &Path, ttl: Duration) -> Result<T, CacheError> {
        let meta = fs::metadata(path)?;
        let age = SystemTime::now()
            .duration_since(meta.modified()?)
            .unwrap_or_default();
        if age > ttl {
            return Err(CacheError::Stale { age, ttl });
        }
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Store a value, replacing any previous entry.
    pub fn put<T: Serialize>(
        &self,
        kind: DataKind,
        lat: f64,
        lng: f64,
        value: &T,
    ) -> Result<(), CacheError> {
        let data = serde_json::to_vec(value)?;
        fs::write(self.path(kind, lat, lng), data)?;
        Ok(())
    }

    /// [`put`](Self::put) that only logs on failure.
    pub fn put_quietly<T: Serialize>(&self, kind: DataKind, lat: f64, lng: f64, value: &T) {
        if let Err(e) = self.put(kind, lat, lng, value) {
            warn!(kind = kind.as_str(), error = %e, "failed to write cache entry");
        }
    }

    pub fn invalidate(&self, kind: DataKind, lat: f64, lng: f64) -> Result<(), CacheError> {
        match fs::remove_file(self.path(kind, lat, lng)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Drop every kind cached for a location.
    pub fn invalidate_location(&self, lat: f64, lng: f64) -> Result<(), CacheError> {
        for kind in DataKind::ALL {
            self.invalidate(kind, lat, lng)?;
        }
        Ok(())
    }
}
