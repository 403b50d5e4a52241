//! # NOAA Tide Prediction Fetching and Caching
//!
//! This module handles all network operations for fetching high/low tide predictions
//! from NOAA's CO-OPS data API, plus the per-record parsing that turns NOAA's string
//! fields into [`TidePrediction`]s.
//!
//! ## Data Source
//!
//! ### NOAA CO-OPS `datagetter`
//! - **URL**: https://api.tidesandcurrents.noaa.gov/api/prod/datagetter
//! - **Product**: `predictions` at `interval=hilo` (one row per high or low)
//! - **Units / datum**: metric, MLLW
//! - **Time zone**: `lst` (station local standard time, no daylight saving), so
//!   every row shares the station's fixed UTC offset
//! - **Format**: JSON, `{"predictions":[{"t":"2024-06-16 03:12","v":"0.123","type":"L"}]}`
//!
//! On a bad request NOAA still answers `200 OK`, with a body of the form
//! `{"error":{"message":"No Predictions data was found..."}}`.
//!
//! ## Caching Strategy
//! - **Location**: `/tmp/tide_predictions_cache.json` by default (cleared on reboot)
//! - **Key**: station ID, begin date and day count, so a config change never
//!   serves another station's tides
//! - **TTL**: 30 minutes by default, checked against the file modification time
//! - Cache write failures are non-fatal
//!
//! ## Error Handling
//! A fetch is all-or-nothing: any network, HTTP status or API error fails the
//! whole batch with a [`TideError`]. Per-record problems are reported by
//! [`parse_prediction`] as [`PredictionError`] and are the caller's to skip.

use crate::config::{Config, NoaaConfig};
use crate::{PredictionBatch, RawPrediction, TideKind, TidePrediction};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fs, io, time::Duration, time::SystemTime};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while fetching a batch of predictions.
#[derive(Error, Debug)]
pub enum TideError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// NOAA answered with an error object instead of predictions
    #[error("NOAA API error: {0}")]
    Api(String),

    /// Response or cache body was not the expected JSON
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Why a single NOAA row could not be turned into a prediction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictionError {
    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),

    #[error("unparseable height {0:?}")]
    Height(String),

    #[error("unknown tide type {0:?}")]
    Kind(String),
}

/// Timestamp layouts accepted for `t`: NOAA's own, then ISO-8601 variants.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse one NOAA row.
///
/// # Example
/// ```
/// use tide_alerts_lib::{tide_data::parse_prediction, RawPrediction, TideKind};
///
/// let raw = RawPrediction {
///     t: "2024-06-16 15:42".to_string(),
///     v: "2.874".to_string(),
///     kind: "H".to_string(),
/// };
/// let prediction = parse_prediction(&raw).unwrap();
/// assert_eq!(prediction.kind, TideKind::High);
/// assert_eq!(prediction.height_meters, 2.874);
/// ```
pub fn parse_prediction(raw: &RawPrediction) -> Result<TidePrediction, PredictionError> {
    let text = raw.t.trim();
    let timestamp = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| PredictionError::Timestamp(raw.t.clone()))?;

    let height_meters: f64 = raw
        .v
        .trim()
        .parse()
        .ok()
        .filter(|h: &f64| h.is_finite())
        .ok_or_else(|| PredictionError::Height(raw.v.clone()))?;

    let kind =
        TideKind::from_code(&raw.kind).ok_or_else(|| PredictionError::Kind(raw.kind.clone()))?;

    Ok(TidePrediction {
        timestamp,
        height_meters,
        kind,
    })
}

#[derive(Debug, Deserialize)]
struct PredictionsResponse {
    #[serde(default)]
    predictions: Option<Vec<RawPrediction>>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Decode a `datagetter` JSON body.
pub fn parse_response(body: &str) -> Result<Vec<RawPrediction>, TideError> {
    let response: PredictionsResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(TideError::Api(error.message.trim().to_string()));
    }
    response
        .predictions
        .ok_or_else(|| TideError::Api("response contained no predictions".to_string()))
}

/// Query parameters for a hi/lo prediction request covering `days` days
/// starting at `begin` (inclusive).
pub fn query_params(
    station_id: &str,
    begin: NaiveDate,
    days: u32,
) -> Vec<(&'static str, String)> {
    let end = begin
        .checked_add_days(Days::new(u64::from(days.max(1) - 1)))
        .unwrap_or(begin);
    vec![
        ("begin_date", begin.format("%Y%m%d").to_string()),
        ("end_date", end.format("%Y%m%d").to_string()),
        ("station", station_id.to_string()),
        ("product", "predictions".to_string()),
        ("datum", "MLLW".to_string()),
        ("time_zone", "lst".to_string()),
        ("interval", "hilo".to_string()),
        ("units", "metric".to_string()),
        ("application", "tide_alerts".to_string()),
        ("format", "json".to_string()),
    ]
}

/// Fetch hi/lo predictions for the configured station from NOAA or cache.
///
/// Cache-first: a fresh cache entry for the same station and range is returned
/// without touching the network.
///
/// # Example
/// ```no_run
/// use chrono::NaiveDate;
/// use tide_alerts_lib::{config::Config, fallback, tide_data::fetch};
///
/// # async fn run() {
/// let config = Config::default();
/// let begin = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
/// let batch = fetch(&config, begin, 7).await.unwrap_or_else(|err| {
///     eprintln!("Failed to fetch tide data: {}", err);
///     fallback::approximate_predictions(&config.station.location(), begin, 7)
/// });
/// # }
/// ```
pub async fn fetch(
    config: &Config,
    begin: NaiveDate,
    days: u32,
) -> Result<PredictionBatch, TideError> {
    let key = CacheKey {
        station_id: config.station.id.clone(),
        begin,
        days,
    };

    // Try cache first - much faster than network fetch
    let noaa = &config.noaa;
    if let Ok(predictions) = load_cache(&noaa.cache_path, noaa.cache_ttl_minutes, &key) {
        debug!(station = %key.station_id, count = predictions.len(), "using cached predictions");
        return Ok(PredictionBatch {
            predictions,
            offline: false,
        });
    }

    let predictions = request_predictions(noaa, &key).await?;
    info!(station = %key.station_id, count = predictions.len(), "fetched predictions from NOAA");

    // Save for future requests (ignore cache write failures)
    if let Err(error) = save_cache(&noaa.cache_path, &key, &predictions) {
        debug!(%error, "could not write prediction cache");
    }

    Ok(PredictionBatch {
        predictions,
        offline: false,
    })
}

// -- Private Implementation --

async fn request_predictions(
    noaa: &NoaaConfig,
    key: &CacheKey,
) -> Result<Vec<RawPrediction>, TideError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(noaa.timeout_secs))
        .build()?;

    let body = client
        .get(&noaa.base_url)
        .query(&query_params(&key.station_id, key.begin, key.days))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_response(&body)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheKey {
    station_id: String,
    begin: NaiveDate,
    days: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    key: CacheKey,
    predictions: Vec<RawPrediction>,
}

/// Load predictions from the cache file if fresh and for the same request.
fn load_cache(
    path: &Path,
    ttl_minutes: u64,
    key: &CacheKey,
) -> Result<Vec<RawPrediction>, io::Error> {
    let meta = fs::metadata(path)?;

    // Check if cache has expired based on file modification time
    let age = SystemTime::now()
        .duration_since(meta.modified()?)
        .map_err(|_| io::Error::other("time error"))?
        .as_secs();

    if age > ttl_minutes * 60 {
        return Err(io::Error::other("stale"));
    }

    let data = fs::read(path)?;
    let cached: CacheFile = serde_json::from_slice(&data)?;
    if cached.key != *key {
        return Err(io::Error::other("different request"));
    }

    Ok(cached.predictions)
}

fn save_cache(path: &Path, key: &CacheKey, predictions: &[RawPrediction]) -> Result<(), io::Error> {
    let file = CacheFile {
        key: key.clone(),
        predictions: predictions.to_vec(),
    };
    let data = serde_json::to_vec(&file)?;
    fs::write(path, data)?;
    Ok(())
}
