//! Moon position, illumination, phase & moonrise/moonset
//!
//! Low-precision lunar theory (Meeus ch. 47, leading terms only) plus the
//! Meeus ch. 48 illuminated-fraction formula.
//! Accuracy: ~1° in position, a few minutes for rise/set, ±0.5 day for phase.

use crate::ephemeris::{self, altitude, astro_refraction, declination, right_ascension, RAD};
use crate::solar;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use core::f64::consts::PI;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth–Sun distance in km.
const SUN_DISTANCE_KM: f64 = 149_598_000.0;

/// Moon centre altitude at rise/set, accounting for parallax and semi-diameter.
const MOONRISE_ALTITUDE_DEG: f64 = 0.133;

/// Geocentric equatorial coordinates of the moon.
#[derive(Debug, Clone, Copy)]
pub struct MoonCoords {
    pub ra: f64,
    pub dec: f64,
    /// Distance in km.
    pub dist_km: f64,
}

pub fn moon_coords(days: f64) -> MoonCoords {
    // mean longitude
    let l = RAD * (218.316 + 13.176_396 * days);
    // mean anomaly
    let m = RAD * (134.963 + 13.064_993 * days);
    // argument of latitude
    let f = RAD * (93.272 + 13.229_350 * days);

    let lon = l + RAD * 6.289 * m.sin();
    let lat = RAD * 5.128 * f.sin();
    let dist_km = 385_001.0 - 20_905.0 * m.cos();

    MoonCoords {
        ra: right_ascension(lon, lat),
        dec: declination(lon, lat),
        dist_km,
    }
}

/// Apparent altitude of the moon's centre in radians, refraction included.
pub fn moon_altitude(instant: DateTime<Utc>, latitude: f64, longitude: f64) -> f64 {
    let lw = RAD * -longitude;
    let phi = RAD * latitude;
    let days = ephemeris::to_days(instant);

    let c = moon_coords(days);
    let h = ephemeris::sidereal_time(days, lw) - c.ra;
    let alt = altitude(h, phi, c.dec);
    alt + astro_refraction(alt)
}

/// Illuminated fraction and phase of the moon at an instant.
#[derive(Debug, Clone, Copy)]
pub struct Illumination {
    /// Illuminated fraction of the disc (0–1).
    pub fraction: f64,
    /// Position in the synodic cycle: 0 = new, 0.25 = first quarter,
    /// 0.5 = full, 0.75 = last quarter.
    pub phase: f64,
}

pub fn illumination(instant: DateTime<Utc>) -> Illumination {
    let days = ephemeris::to_days(instant);
    let s = solar::sun_coords(days);
    let m = moon_coords(days);

    // geocentric elongation of the Moon from the Sun
    let phi = (s.dec.sin() * m.dec.sin() + s.dec.cos() * m.dec.cos() * (s.ra - m.ra).cos())
        .acos();
    // selenocentric elongation of the Earth from the Sun
    let inc = (SUN_DISTANCE_KM * phi.sin()).atan2(m.dist_km - SUN_DISTANCE_KM * phi.cos());
    let angle = (s.dec.cos() * (s.ra - m.ra).sin())
        .atan2(s.dec.sin() * m.dec.cos() - s.dec.cos() * m.dec.sin() * (s.ra - m.ra).cos());

    let sign = if angle < 0.0 { -1.0 } else { 1.0 };
    Illumination {
        fraction: (1.0 + inc.cos()) / 2.0,
        phase: 0.5 + 0.5 * inc * sign / PI,
    }
}

/// The eight conventional named phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoonPhase {
    #[serde(rename = "New Moon")]
    NewMoon,
    #[serde(rename = "Waxing Crescent")]
    WaxingCrescent,
    #[serde(rename = "First Quarter")]
    FirstQuarter,
    #[serde(rename = "Waxing Gibbous")]
    WaxingGibbous,
    #[serde(rename = "Full Moon")]
    FullMoon,
    #[serde(rename = "Waning Gibbous")]
    WaningGibbous,
    #[serde(rename = "Last Quarter")]
    LastQuarter,
    #[serde(rename = "Waning Crescent")]
    WaningCrescent,
}

impl MoonPhase {
    const ALL: [MoonPhase; 8] = [
        MoonPhase::NewMoon,
        MoonPhase::WaxingCrescent,
        MoonPhase::FirstQuarter,
        MoonPhase::WaxingGibbous,
        MoonPhase::FullMoon,
        MoonPhase::WaningGibbous,
        MoonPhase::LastQuarter,
        MoonPhase::WaningCrescent,
    ];

    /// Name the phase for a cycle position in `[0, 1)`.
    ///
    /// Each named phase owns an eighth of the cycle centred on its nominal
    /// point, so "Full Moon" covers 0.4375..0.5625.
    pub fn from_cycle_fraction(phase: f64) -> Self {
        let phase = phase.rem_euclid(1.0);
        let index = ((phase * 8.0) + 0.5).floor() as usize & 7;
        Self::ALL[index]
    }

    pub fn name(self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

impl fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Moonrise and moonset within one local calendar day. Either can be absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonEvents {
    pub moonrise: Option<DateTime<Utc>>,
    pub moonset: Option<DateTime<Utc>>,
}

/// Moonrise and moonset on `date` in the civil zone `offset`.
///
/// Scans the local day two hours at a time, fitting a parabola through the
/// altitude at each step and solving it for horizon crossings.
pub fn moon_events(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    offset: FixedOffset,
) -> MoonEvents {
    let start = ephemeris::local_to_utc(date, NaiveTime::default(), offset);
    let hc = MOONRISE_ALTITUDE_DEG * RAD;
    let at = |hours: f64| start + Duration::milliseconds((hours * 3_600_000.0) as i64);
    let alt_at = |hours: f64| moon_altitude(at(hours), latitude, longitude) - hc;

    let mut rise: Option<f64> = None;
    let mut set: Option<f64> = None;
    let mut h0 = alt_at(0.0);

    let mut i = 1.0;
    while i <= 24.0 {
        let h1 = alt_at(i);
        let h2 = alt_at(i + 1.0);

        let a = (h0 + h2) / 2.0 - h1;
        let b = (h2 - h0) / 2.0;
        let xe = -b / (2.0 * a);
        let ye = (a * xe + b) * xe + h1;
        let d = b * b - 4.0 * a * h1;

        let mut roots = 0;
        let (mut x1, mut x2) = (0.0, 0.0);
        if d >= 0.0 {
            let dx = d.sqrt() / (a.abs() * 2.0);
            x1 = xe - dx;
            x2 = xe + dx;
            if x1.abs() <= 1.0 {
                roots += 1;
            }
            if x2.abs() <= 1.0 {
                roots += 1;
            }
            if x1 < -1.0 {
                x1 = x2;
            }
        }

        if roots == 1 {
            if h0 < 0.0 {
                rise = Some(i + x1);
            } else {
                set = Some(i + x1);
            }
        } else if roots == 2 {
            rise = Some(i + if ye < 0.0 { x2 } else { x1 });
            set = Some(i + if ye < 0.0 { x1 } else { x2 });
        }

        if rise.is_some() && set.is_some() {
            break;
        }

        h0 = h2;
        i += 2.0;
    }

    MoonEvents {
        moonrise: rise.map(&at),
        moonset: set.map(&at),
    }
}
