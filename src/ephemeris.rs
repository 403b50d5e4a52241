//! Low-precision positional astronomy for the moon, plus local/UTC helpers.
//!
//! Formulae follow the closed-form series in Meeus, *Astronomical Algorithms*
//! (truncated), which are good to a few minutes for moonrise and moonset at
//! non-polar latitudes. Angles are radians throughout; time is counted in
//! days since the J2000.0 epoch.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use core::f64::consts::PI;

pub const RAD: f64 = PI / 180.0;

const SECONDS_PER_DAY: f64 = 86_400.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;

/// Obliquity of the ecliptic at J2000.
const OBLIQUITY: f64 = RAD * 23.4397;

/// Julian date of an instant.
pub fn to_julian(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / 1000.0 / SECONDS_PER_DAY - 0.5 + J1970
}

/// Days since J2000.0.
pub fn to_days(instant: DateTime<Utc>) -> f64 {
    to_julian(instant) - J2000
}

pub fn right_ascension(lon: f64, lat: f64) -> f64 {
    (lon.sin() * OBLIQUITY.cos() - lat.tan() * OBLIQUITY.sin()).atan2(lon.cos())
}

pub fn declination(lon: f64, lat: f64) -> f64 {
    (lat.sin() * OBLIQUITY.cos() + lat.cos() * OBLIQUITY.sin() * lon.sin()).asin()
}

/// Altitude above the horizon for hour angle `h`, observer latitude `phi`.
pub fn altitude(h: f64, phi: f64, dec: f64) -> f64 {
    (phi.sin() * dec.sin() + phi.cos() * dec.cos() * h.cos()).asin()
}

/// Local sidereal time; `lw` is west longitude in radians.
pub fn sidereal_time(days: f64, lw: f64) -> f64 {
    RAD * (280.16 + 360.985_623_5 * days) - lw
}

/// Atmospheric refraction correction (Sæmundsson) for an apparent altitude.
pub fn astro_refraction(h: f64) -> f64 {
    // Formula breaks down below the horizon.
    let h = h.max(0.0);
    0.000_296_7 / (h + 0.003_125_36 / (h + 0.089_011_79)).tan()
}

/// UTC instant of a local civil date and time.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Local time-of-day of an instant, rounded to the nearest minute.
pub fn utc_to_local_minute(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveTime {
    let rounded = instant + Duration::seconds(30);
    let local = rounded.with_timezone(&offset).time();
    local
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local)
}
