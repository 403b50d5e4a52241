//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tide-config.toml file.
//! It provides a centralized way to configure the NOAA station and its location, the
//! proximity window used for correlation, alert scheduling, and NOAA API access.
//!
//! Every section and field has a default, so a partial file only overrides what it names:
//!
//! ```toml
//! [station]
//! id = "8443970"
//! name = "Boston, MA"
//! latitude = 42.3539
//! longitude = -71.0503
//! utc_offset_minutes = -300
//!
//! [correlation]
//! window_hours = 1.5
//! ```

use crate::correlator::DEFAULT_WINDOW_HOURS;
use crate::Location;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "tide-config.toml";

/// Longest prediction range accepted, in days.
pub const MAX_DAYS: u32 = 31;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("window_hours must be a finite, non-negative number (got {0})")]
    InvalidWindow(f64),

    #[error("station coordinates out of range: lat {latitude}, lon {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("utc_offset_minutes must be within ±1439 (got {0})")]
    InvalidOffset(i32),

    #[error("days must be between 1 and {MAX_DAYS} (got {0})")]
    InvalidDays(u32),

    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration loaded from tide-config.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// NOAA station and its geographic location
    pub station: StationConfig,
    /// Tide / astronomy correlation settings
    pub correlation: CorrelationConfig,
    /// Alert scheduling
    pub alerts: AlertConfig,
    /// NOAA API access and caching
    pub noaa: NoaaConfig,
}

/// NOAA tide station configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StationConfig {
    /// NOAA station ID (e.g., "8418150" for Portland, ME)
    pub id: String,
    /// Human-readable station name
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Station standard time offset from UTC in minutes (no daylight saving;
    /// predictions are requested in NOAA `lst`)
    pub utc_offset_minutes: i32,
}

/// Correlation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// How close (in hours) a low tide must be to a sun/moon event to be flagged
    pub window_hours: f64,
    /// Number of days of predictions to fetch, starting today
    pub days: u32,
}

/// Alert scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// How far ahead of a flagged tide the alert becomes due
    pub lead_minutes: i64,
    /// JSON file holding "already shown" alert state
    pub state_path: PathBuf,
}

/// NOAA CO-OPS API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NoaaConfig {
    pub base_url: String,
    /// Prediction cache file
    pub cache_path: PathBuf,
    /// Cache TTL in minutes
    pub cache_ttl_minutes: u64,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            id: "8418150".to_string(),
            name: "Portland, ME".to_string(),
            latitude: 43.6567,
            longitude: -70.2467,
            utc_offset_minutes: -300,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            window_hours: DEFAULT_WINDOW_HOURS,
            days: 7,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            lead_minutes: 60,
            state_path: PathBuf::from("/tmp/tide_alerts_state.json"),
        }
    }
}

impl Default for NoaaConfig {
    fn default() -> Self {
        NoaaConfig {
            base_url: "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter".to_string(),
            cache_path: PathBuf::from("/tmp/tide_predictions_cache.json"),
            cache_ttl_minutes: 30,
            timeout_secs: 30,
        }
    }
}

impl StationConfig {
    pub fn location(&self) -> Location {
        Location {
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

/// Reject a prediction range outside `1..=MAX_DAYS`.
pub fn check_days(days: u32) -> Result<u32, ConfigError> {
    if (1..=MAX_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::InvalidDays(days))
    }
}

impl Config {
    /// Load configuration from tide-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        station = %config.station.name,
                        path = %path.display(),
                        "loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    warn!(error = %e, "invalid config file format, using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Reject values the correlator cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.correlation.window_hours;
        if !window.is_finite() || window < 0.0 {
            return Err(ConfigError::InvalidWindow(window));
        }

        let (latitude, longitude) = (self.station.latitude, self.station.longitude);
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        if self.station.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidOffset(self.station.utc_offset_minutes));
        }

        check_days(self.correlation.days)?;

        Ok(())
    }

    /// Save current configuration to the given path as pretty TOML
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
