//! # Tide Alerts Core Library
//!
//! This library correlates NOAA high/low tide predictions with the sun and the
//! moon. Each tide event is enriched with the sunrise, sunset, moonrise, moonset
//! and moon phase of its local calendar day, flagged when it falls close to one
//! of those events, and turned into alert entries for a notification scheduler.
//!
//! ## Data Flow
//! 1. **Online**: Fetch hi/lo predictions from NOAA → cache → [`PredictionBatch`]
//! 2. **Offline**: Use the two-constituent fallback model → mark as offline
//! 3. **Correlate**: [`correlator::enrich_raw`] parses each row, skipping bad ones,
//!    and asks an [`astro::AstronomicalProvider`] for that day's times
//! 4. **Alert**: [`correlator::upcoming_alerts`] → [`alerts::AlertScheduler`]
//!
//! ## Time Zones
//! NOAA predictions are requested in station local standard time (`lst`), so
//! every date and time-of-day in this crate is a naive value at the fixed UTC
//! offset of the [`Location`], all year round. The offset itself is only
//! needed where the ephemeris converts to and from universal time.
//!
//! ## Core Types
//! - [`TidePrediction`]: a parsed high or low tide
//! - [`AstronomicalTimes`]: sun and moon times for one (location, date)
//! - [`EnrichedTideEvent`]: prediction + times + proximity flags
//! - [`AlertEntry`]: one notable event handed to the scheduler

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub mod alerts;
pub mod astro;
pub mod config;
pub mod correlator;
pub mod ephemeris;
pub mod fallback;
pub mod lunar;
pub mod report;
pub mod solar;
pub mod tide_data;

pub use lunar::MoonPhase;

/// NOAA classification of a tide extremum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    /// Parse NOAA's single-character type code (`H` or `L`).
    ///
    /// NOAA also emits `HH`/`LL` (higher high, lower low) for some stations;
    /// those map onto the plain kinds.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "H" | "HH" => Some(TideKind::High),
            "L" | "LL" => Some(TideKind::Low),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            TideKind::High => "H",
            TideKind::Low => "L",
        }
    }
}

impl fmt::Display for TideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TideKind::High => "High",
            TideKind::Low => "Low",
        })
    }
}

/// A prediction exactly as NOAA's `datagetter` returns it.
///
/// ```
/// use tide_alerts_lib::RawPrediction;
///
/// let raw: RawPrediction =
///     serde_json::from_str(r#"{"t":"2024-06-16 03:12","v":"0.123","type":"L"}"#).unwrap();
/// assert_eq!(raw.kind, "L");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Local timestamp, `YYYY-MM-DD HH:MM`
    pub t: String,
    /// Height as a decimal string
    pub v: String,
    /// `H` or `L`
    #[serde(rename = "type")]
    pub kind: String,
}

/// A batch of raw predictions together with where they came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionBatch {
    pub predictions: Vec<RawPrediction>,
    /// True if produced by the fallback model instead of NOAA
    pub offline: bool,
}

/// A parsed high or low tide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TidePrediction {
    /// Station local time
    pub timestamp: NaiveDateTime,
    pub height_meters: f64,
    pub kind: TideKind,
}

impl TidePrediction {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// An observer position plus the civil time zone its timestamps use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Offset of station local time from UTC, in minutes (east positive)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Location {
    /// Fixed offset for this location; out-of-range offsets are logged and
    /// fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            warn!(
                location = %self.name,
                utc_offset_minutes = self.utc_offset_minutes,
                "UTC offset out of range, using UTC"
            );
            Utc.fix()
        })
    }
}


/// Sun and moon times for one location on one local calendar date.
///
/// Any of the rise/set times may be absent: the moon skips a rise or a set
/// roughly once a month, and at high latitudes the sun can stay up (or down)
/// all day. An absent time never sets a proximity flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AstronomicalTimes {
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
    pub moonrise: Option<NaiveTime>,
    pub moonset: Option<NaiveTime>,
    pub moon_phase: MoonPhase,
    /// Illuminated fraction of the disc, 0–100
    pub moon_illumination_percent: u8,
}

impl AstronomicalTimes {
    pub fn moon_phase_name(&self) -> &'static str {
        self.moon_phase.name()
    }
}

/// Which astronomical events a tide falls within the window of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proximity {
    pub sunrise: bool,
    pub sunset: bool,
    pub moonrise: bool,
    pub moonset: bool,
}

/// A tide prediction annotated with its day's astronomy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTideEvent {
    pub prediction: TidePrediction,
    pub astro: AstronomicalTimes,
    pub proximity: Proximity,
    pub near_sunrise_or_sunset: bool,
    pub near_moonrise_or_moonset: bool,
}

/// The astronomical event an alert is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Sunrise,
    Sunset,
    Moonrise,
    Moonset,
}

impl AlertCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertCategory::Sunrise => "sunrise",
            AlertCategory::Sunset => "sunset",
            AlertCategory::Moonrise => "moonrise",
            AlertCategory::Moonset => "moonset",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A low tide worth notifying about, stamped with the tide's local date and time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub category: AlertCategory,
}

impl AlertEntry {
    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Stable identifier used for "already shown" bookkeeping.
    pub fn key(&self) -> String {
        format!(
            "{}T{}:{}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M"),
            self.category
        )
    }
}
