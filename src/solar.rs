//! Sun position and sunrise/sunset.
//!
//! Sunrise and sunset come from the SPA implementation in `solar_positioning`,
//! using the standard horizon (upper limb on the horizon with refraction).
//! The low-precision sun coordinates here only feed the moon illumination.

use crate::ephemeris::{self, declination, right_ascension, RAD};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use core::f64::consts::PI;
use solar_positioning::{spa, Horizon, SunriseResult};
use tracing::warn;

/// ΔT (TT - UT) in seconds, close enough for minute-level rise/set times.
const DELTA_T_SECONDS: f64 = 69.0;

/// Sunrise and sunset for one local date. `None` means the sun did not cross
/// the horizon (polar day or polar night).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunEvents {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl SunEvents {
    const NONE: SunEvents = SunEvents {
        sunrise: None,
        sunset: None,
    };
}

/// Equatorial coordinates of the sun.
#[derive(Debug, Clone, Copy)]
pub struct SunCoords {
    pub dec: f64,
    pub ra: f64,
}

fn solar_mean_anomaly(days: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * days)
}

fn ecliptic_longitude(m: f64) -> f64 {
    // equation of centre
    let c = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    // perihelion of the Earth
    let p = RAD * 102.9372;
    m + c + p + PI
}

pub fn sun_coords(days: f64) -> SunCoords {
    let m = solar_mean_anomaly(days);
    let l = ecliptic_longitude(m);
    SunCoords {
        dec: declination(l, 0.0),
        ra: right_ascension(l, 0.0),
    }
}

/// Sunrise and sunset on `date` in the civil zone `offset`.
///
/// The SPA calculation runs for the UTC day containing local noon, so the
/// transit it finds is the one belonging to that local calendar date.
pub fn sun_events(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    offset: FixedOffset,
) -> SunEvents {
    let local_noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
    let utc_day = ephemeris::local_to_utc(date, local_noon, offset).date_naive();
    let utc_midnight = utc_day.and_time(NaiveTime::default()).and_utc();

    let result = spa::sunrise_sunset_utc_for_horizon(
        utc_day.year(),
        utc_day.month(),
        utc_day.day(),
        latitude,
        longitude,
        DELTA_T_SECONDS,
        Horizon::SunriseSunset,
    );

    match result {
        Ok(SunriseResult::RegularDay { sunrise, sunset, .. }) => {
            let at = |day: i64, hours: f64| {
                utc_midnight
                    + Duration::days(day)
                    + Duration::seconds((hours * 3600.0).round() as i64)
            };
            let (rise_day, rise_hours) = sunrise.day_and_hours();
            let (set_day, set_hours) = sunset.day_and_hours();
            SunEvents {
                sunrise: Some(at(rise_day.into(), rise_hours)),
                sunset: Some(at(set_day.into(), set_hours)),
            }
        }
        Ok(SunriseResult::AllDay { .. }) | Ok(SunriseResult::AllNight { .. }) => SunEvents::NONE,
        Err(error) => {
            warn!(%error, latitude, longitude, %date, "sunrise calculation failed");
            SunEvents::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn minutes(t: DateTime<Utc>) -> i64 {
        i64::from(t.hour() * 60 + t.minute())
    }

    #[test]
    fn london_midsummer_sunrise_and_sunset() {
        // Published: sunrise 03:43 UTC, sunset 20:21 UTC on 2024-06-21.
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let events = sun_events(date, 51.5074, -0.1278, utc);

        let rise = events.sunrise.expect("sun rises in London in June");
        let set = events.sunset.expect("sun sets in London in June");
        assert!((minutes(rise) - (3 * 60 + 43)).abs() <= 3, "sunrise {rise}");
        assert!((minutes(set) - (20 * 60 + 21)).abs() <= 3, "sunset {set}");
    }

    #[test]
    fn portland_winter_events_fall_on_requested_local_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let events = sun_events(date, 43.6591, -70.2568, est);

        let rise = events.sunrise.unwrap().with_timezone(&est);
        let set = events.sunset.unwrap().with_timezone(&est);
        assert_eq!(rise.date_naive(), date);
        assert_eq!(set.date_naive(), date);
        // Roughly 07:10 and 16:35 local.
        assert!((6..=7).contains(&rise.hour()), "sunrise {rise}");
        assert!((16..=17).contains(&set.hour()), "sunset {set}");
    }

    #[test]
    fn polar_night_has_no_sunrise() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        let utc = FixedOffset::east_opt(3600).unwrap();
        let events = sun_events(date, 78.2232, 15.6267, utc);
        assert_eq!(events.sunrise, None);
        assert_eq!(events.sunset, None);
    }

    #[test]
    fn polar_day_has_no_sunset() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let cest = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(sun_events(date, 78.2232, 15.6267, cest), SunEvents::NONE);
    }

    #[test]
    fn sun_declination_peaks_near_solstice() {
        let solstice = Utc.with_ymd_and_hms(2024, 6, 20, 21, 0, 0).unwrap();
        let dec = sun_coords(ephemeris::to_days(solstice)).dec / RAD;
        assert!((dec - 23.44).abs() < 0.1, "declination {dec}");
    }
}
