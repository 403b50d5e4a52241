//! # Astronomical Time Providers
//!
//! The correlator never computes astronomy itself; it asks an
//! [`AstronomicalProvider`] for the sun and moon times of a (location, date)
//! pair. [`EphemerisProvider`] computes them from the built-in low-precision
//! ephemeris. [`FixedTimesProvider`] serves pre-computed times, which is how
//! externally sourced almanac data (or test fixtures) enter the pipeline.

use crate::{ephemeris, lunar, solar, AstronomicalTimes, Location, MoonPhase};
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;

/// Source of sunrise/sunset/moonrise/moonset and moon phase for a date.
///
/// Implementations must be deterministic: the same location and date always
/// yield the same times.
pub trait AstronomicalProvider {
    fn times_for(&self, location: &Location, date: NaiveDate) -> AstronomicalTimes;
}

/// Computes times from the built-in solar and lunar ephemeris.
///
/// All returned times-of-day are in the location's civil zone, rounded to
/// the nearest minute. Moon phase and illumination are sampled at local noon.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemerisProvider;

impl AstronomicalProvider for EphemerisProvider {
    fn times_for(&self, location: &Location, date: NaiveDate) -> AstronomicalTimes {
        let offset = location.offset();
        let to_local = |instant| ephemeris::utc_to_local_minute(instant, offset);

        let sun = solar::sun_events(date, location.latitude, location.longitude, offset);
        let moon = lunar::moon_events(date, location.latitude, location.longitude, offset);

        let local_noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
        let illum = lunar::illumination(ephemeris::local_to_utc(date, local_noon, offset));

        AstronomicalTimes {
            sunrise: sun.sunrise.map(to_local),
            sunset: sun.sunset.map(to_local),
            moonrise: moon.moonrise.map(to_local),
            moonset: moon.moonset.map(to_local),
            moon_phase: MoonPhase::from_cycle_fraction(illum.phase),
            moon_illumination_percent: (illum.fraction * 100.0).round().clamp(0.0, 100.0) as u8,
        }
    }
}

/// Serves pre-computed times per date, with a fallback for unknown dates.
#[derive(Debug, Clone)]
pub struct FixedTimesProvider {
    default: AstronomicalTimes,
    by_date: HashMap<NaiveDate, AstronomicalTimes>,
}

impl FixedTimesProvider {
    pub fn new(default: AstronomicalTimes) -> Self {
        Self {
            default,
            by_date: HashMap::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate, times: AstronomicalTimes) -> Self {
        self.by_date.insert(date, times);
        self
    }
}

impl AstronomicalProvider for FixedTimesProvider {
    fn times_for(&self, _location: &Location, date: NaiveDate) -> AstronomicalTimes {
        self.by_date.get(&date).unwrap_or(&self.default).clone()
    }
}
