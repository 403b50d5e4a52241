//! # Tide / Sun / Moon Event Correlation
//!
//! Flags tides that happen close (in time-of-day) to a sunrise, sunset,
//! moonrise or moonset on the same local date, and derives alert entries
//! from the flagged tides.
//!
//! ## Proximity Rules
//! - Times are compared as minutes since local midnight. The distance between
//!   two times-of-day wraps at midnight: `min(|a - b|, 1440 - |a - b|)`, so
//!   11:00 PM and 1:00 AM are 120 minutes apart.
//! - A tide is near an event when that distance is at most `window_hours * 60`.
//! - Only **low** tides are eligible. High tides are never flagged.
//! - A missing rise/set time (the moon skips one most months) simply never
//!   matches.
//!
//! ## Alert Category Order
//! A flagged low tide becomes one alert whose category is chosen in the fixed
//! order sunrise, moonrise, moonset, then sunset. The order decides which
//! event wins when a tide is near several at once and must stay stable so
//! that alert keys are deterministic.
//!
//! Everything here is pure: the flags of an event depend only on its own
//! timestamp and its own astronomical times.

use crate::astro::AstronomicalProvider;
use crate::tide_data::parse_prediction;
use crate::{
    AlertCategory, AlertEntry, AstronomicalTimes, EnrichedTideEvent, Location, Proximity,
    RawPrediction, TideKind, TidePrediction,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Default proximity window in hours.
pub const DEFAULT_WINDOW_HOURS: f64 = 2.0;

/// Minutes elapsed since local midnight.
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Distance between two times-of-day in minutes, wrapping at midnight.
///
/// Always in `0..=720`.
///
/// ```
/// use chrono::NaiveTime;
/// use tide_alerts_lib::correlator::time_distance;
///
/// let late = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
/// let early = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
/// assert_eq!(time_distance(late, early), 120);
/// ```
pub fn time_distance(a: NaiveTime, b: NaiveTime) -> u32 {
    let diff = minutes_since_midnight(a).abs_diff(minutes_since_midnight(b));
    diff.min(MINUTES_PER_DAY - diff)
}

/// Parse a clock time as shown to users.
///
/// Accepts 12-hour forms (`"6:30 AM"`, `"11:00 pm"`, `"06:30AM"`) and 24-hour
/// forms (`"18:30"`, `"18:30:00"`).
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    let normalized = text.trim().to_ascii_uppercase();
    ["%I:%M %p", "%I:%M%p", "%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&normalized, fmt).ok())
}

/// Render a time-of-day as `6:05 AM`.
pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

fn within(tide: NaiveTime, event: Option<NaiveTime>, window_minutes: f64) -> bool {
    event.is_some_and(|event| f64::from(time_distance(tide, event)) <= window_minutes)
}

/// Which of the day's events a tide falls within `window_hours` of.
///
/// High tides always get an all-false result.
pub fn proximity(
    prediction: &TidePrediction,
    astro: &AstronomicalTimes,
    window_hours: f64,
) -> Proximity {
    if prediction.kind != TideKind::Low {
        return Proximity::default();
    }

    let window_minutes = window_hours * 60.0;
    let tide = prediction.time();
    Proximity {
        sunrise: within(tide, astro.sunrise, window_minutes),
        sunset: within(tide, astro.sunset, window_minutes),
        moonrise: within(tide, astro.moonrise, window_minutes),
        moonset: within(tide, astro.moonset, window_minutes),
    }
}

/// Attach already-computed astronomical times to one prediction.
pub fn enrich_event(
    prediction: TidePrediction,
    astro: AstronomicalTimes,
    window_hours: f64,
) -> EnrichedTideEvent {
    let proximity = proximity(&prediction, &astro, window_hours);
    EnrichedTideEvent {
        near_sunrise_or_sunset: proximity.sunrise || proximity.sunset,
        near_moonrise_or_moonset: proximity.moonrise || proximity.moonset,
        prediction,
        astro,
        proximity,
    }
}

/// Enrich predictions with the astronomy of their local dates.
///
/// Output order matches input order. The provider is consulted once per
/// distinct date in the batch.
pub fn enrich<P>(
    predictions: &[TidePrediction],
    location: &Location,
    window_hours: f64,
    provider: &P,
) -> Vec<EnrichedTideEvent>
where
    P: AstronomicalProvider + ?Sized,
{
    let mut by_date: HashMap<NaiveDate, AstronomicalTimes> = HashMap::new();

    predictions
        .iter()
        .map(|prediction| {
            let astro = by_date
                .entry(prediction.date())
                .or_insert_with(|| provider.times_for(location, prediction.date()))
                .clone();
            enrich_event(prediction.clone(), astro, window_hours)
        })
        .collect()
}

/// Parse and enrich raw NOAA rows.
///
/// A row that fails to parse is logged and dropped; the rest of the batch is
/// still enriched.
pub fn enrich_raw<P>(
    raw: &[RawPrediction],
    location: &Location,
    window_hours: f64,
    provider: &P,
) -> Vec<EnrichedTideEvent>
where
    P: AstronomicalProvider + ?Sized,
{
    let predictions: Vec<TidePrediction> = raw
        .iter()
        .filter_map(|row| match parse_prediction(row) {
            Ok(prediction) => Some(prediction),
            Err(error) => {
                warn!(%error, row = ?row, "skipping unparseable prediction");
                None
            }
        })
        .collect();

    if predictions.len() < raw.len() {
        debug!(
            kept = predictions.len(),
            dropped = raw.len() - predictions.len(),
            "parsed prediction batch"
        );
    }

    enrich(&predictions, location, window_hours, provider)
}

fn classify(proximity: &Proximity) -> AlertCategory {
    if proximity.sunrise {
        AlertCategory::Sunrise
    } else if proximity.moonrise {
        AlertCategory::Moonrise
    } else if proximity.moonset {
        AlertCategory::Moonset
    } else {
        AlertCategory::Sunset
    }
}

/// Alert entries for low tides near a sun or moon event.
///
/// Proximity is re-evaluated at `window_hours` from each event's own
/// timestamp and times, so passing the window used for [`enrich`] reproduces
/// its flags exactly. Entries keep input order.
pub fn upcoming_alerts(events: &[EnrichedTideEvent], window_hours: f64) -> Vec<AlertEntry> {
    events
        .iter()
        .filter(|event| event.prediction.kind == TideKind::Low)
        .filter_map(|event| {
            let proximity = proximity(&event.prediction, &event.astro, window_hours);
            let near_sun = proximity.sunrise || proximity.sunset;
            let near_moon = proximity.moonrise || proximity.moonset;
            if !(near_sun || near_moon) {
                return None;
            }
            Some(AlertEntry {
                date: event.prediction.date(),
                time: event.prediction.time(),
                category: classify(&proximity),
            })
        })
        .collect()
}

/// The nearest alert strictly after `now`, by full date-time.
pub fn next_alert(alerts: &[AlertEntry], now: NaiveDateTime) -> Option<AlertEntry> {
    alerts
        .iter()
        .filter(|alert| alert.datetime() > now)
        .min_by_key(|alert| alert.datetime())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::FixedTimesProvider;
    use crate::MoonPhase;

    fn t(text: &str) -> NaiveTime {
        parse_clock_time(text).unwrap()
    }

    fn location() -> Location {
        Location {
            name: "Test Harbor".to_string(),
            latitude: 43.66,
            longitude: -70.25,
            utc_offset_minutes: -300,
        }
    }

    fn times(
        sunrise: &str,
        sunset: &str,
        moonrise: Option<&str>,
        moonset: Option<&str>,
    ) -> AstronomicalTimes {
        AstronomicalTimes {
            sunrise: Some(t(sunrise)),
            sunset: Some(t(sunset)),
            moonrise: moonrise.map(t),
            moonset: moonset.map(t),
            moon_phase: MoonPhase::WaxingGibbous,
            moon_illumination_percent: 72,
        }
    }

    fn tide(date: (i32, u32, u32), time: &str, kind: TideKind) -> TidePrediction {
        TidePrediction {
            timestamp: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_time(t(time)),
            height_meters: 0.2,
            kind,
        }
    }

    #[test]
    fn parses_twelve_and_twenty_four_hour_times() {
        assert_eq!(t("6:30 AM"), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(t("12:00 am"), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(t("12:15 PM"), NaiveTime::from_hms_opt(12, 15, 0).unwrap());
        assert_eq!(t("11:59PM"), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert_eq!(t("18:05"), NaiveTime::from_hms_opt(18, 5, 0).unwrap());
        assert_eq!(parse_clock_time("25:00"), None);
        assert_eq!(parse_clock_time("noon"), None);
    }

    #[test]
    fn formats_as_twelve_hour_clock() {
        assert_eq!(format_clock_time(t("06:05")), "6:05 AM");
        assert_eq!(format_clock_time(t("23:40")), "11:40 PM");
    }

    #[test]
    fn distance_wraps_around_midnight() {
        assert_eq!(time_distance(t("11:00 PM"), t("01:00 AM")), 120);
        assert_eq!(time_distance(t("12:00 AM"), t("12:00 PM")), 720);
        assert_eq!(time_distance(t("6:00 AM"), t("6:00 AM")), 0);
    }

    #[test]
    fn low_tide_near_sunrise_is_flagged() {
        let provider = FixedTimesProvider::new(times("6:30 AM", "7:45 PM", None, None));
        let events = enrich(
            &[tide((2024, 6, 1), "6:00 AM", TideKind::Low)],
            &location(),
            2.0,
            &provider,
        );
        assert!(events[0].near_sunrise_or_sunset);
        assert!(events[0].proximity.sunrise);
        assert!(!events[0].proximity.sunset);
        assert!(!events[0].near_moonrise_or_moonset);
    }

    #[test]
    fn narrow_window_excludes_thirty_minute_gap() {
        let provider = FixedTimesProvider::new(times("6:30 AM", "7:45 PM", None, None));
        let events = enrich(
            &[tide((2024, 6, 1), "6:00 AM", TideKind::Low)],
            &location(),
            0.4,
            &provider,
        );
        assert!(!events[0].near_sunrise_or_sunset);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let provider = FixedTimesProvider::new(times("6:30 AM", "7:45 PM", None, None));
        let events = enrich(
            &[tide((2024, 6, 1), "8:30 AM", TideKind::Low)],
            &location(),
            2.0,
            &provider,
        );
        assert!(events[0].proximity.sunrise);
    }

    #[test]
    fn high_tide_is_never_flagged() {
        let provider = FixedTimesProvider::new(times(
            "6:00 AM",
            "6:00 PM",
            Some("6:00 AM"),
            Some("6:00 PM"),
        ));
        let events = enrich(
            &[tide((2024, 6, 1), "6:00 AM", TideKind::High)],
            &location(),
            12.0,
            &provider,
        );
        assert!(!events[0].near_sunrise_or_sunset);
        assert!(!events[0].near_moonrise_or_moonset);
        assert!(upcoming_alerts(&events, 12.0).is_empty());
    }

    #[test]
    fn missing_moon_times_never_match() {
        let provider =
            FixedTimesProvider::new(times("5:00 AM", "8:00 PM", None, Some("1:00 PM")));
        let events = enrich(
            &[tide((2024, 6, 1), "12:30 PM", TideKind::Low)],
            &location(),
            1.0,
            &provider,
        );
        assert!(events[0].near_moonrise_or_moonset);
        assert!(events[0].proximity.moonset);
        assert!(!events[0].proximity.moonrise);
    }

    #[test]
    fn category_order_prefers_sunrise_then_moonrise_then_moonset() {
        let day = (2024, 6, 1);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let all_near = times("6:00 AM", "7:00 AM", Some("6:10 AM"), Some("6:20 AM"));
        let moon_only = times("1:00 AM", "1:00 PM", Some("6:10 AM"), Some("6:20 AM"));
        let set_only = times("1:00 AM", "1:00 PM", Some("11:00 PM"), Some("6:20 AM"));
        let sunset_only = times("1:00 AM", "6:30 AM", None, None);

        let cases = [
            (all_near, AlertCategory::Sunrise),
            (moon_only, AlertCategory::Moonrise),
            (set_only, AlertCategory::Moonset),
            (sunset_only, AlertCategory::Sunset),
        ];
        for (astro, expected) in cases {
            let provider = FixedTimesProvider::new(astro);
            let predictions = [tide(day, "6:15 AM", TideKind::Low)];
            let events = enrich(&predictions, &location(), 1.0, &provider);
            let alerts = upcoming_alerts(&events, 1.0);
            assert_eq!(
                alerts,
                vec![AlertEntry {
                    date,
                    time: t("6:15 AM"),
                    category: expected
                }]
            );
        }
    }

    #[test]
    fn alert_window_narrower_than_enrichment_window() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let provider = FixedTimesProvider::new(times("6:30 AM", "7:45 PM", None, None));
        let predictions = [
            tide((2024, 6, 1), "5:00 AM", TideKind::Low),
            tide((2024, 6, 1), "6:00 AM", TideKind::Low),
            tide((2024, 6, 1), "7:30 PM", TideKind::Low),
        ];
        let events = enrich(&predictions, &location(), 2.0, &provider);
        assert!(events.iter().all(|e| e.near_sunrise_or_sunset));

        // 5:00 AM is 90 minutes from sunrise and drops out at half an hour
        let alerts = upcoming_alerts(&events, 0.5);
        assert_eq!(
            alerts,
            vec![
                AlertEntry {
                    date,
                    time: t("6:00 AM"),
                    category: AlertCategory::Sunrise
                },
                AlertEntry {
                    date,
                    time: t("7:30 PM"),
                    category: AlertCategory::Sunset
                },
            ]
        );
        // Stored flags keep the enrichment window
        assert!(events[0].proximity.sunrise);
        assert_eq!(upcoming_alerts(&events, 2.0).len(), 3);
    }

    #[test]
    fn empty_input_yields_no_alerts() {
        let provider = FixedTimesProvider::new(times("6:00 AM", "6:00 PM", None, None));
        let events = enrich(&[], &location(), 2.0, &provider);
        assert!(events.is_empty());
        assert!(upcoming_alerts(&events, 2.0).is_empty());
    }

    #[test]
    fn enrich_keeps_input_order_and_uses_each_date() {
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let provider = FixedTimesProvider::new(times("1:00 AM", "1:00 PM", None, None))
            .with_date(d2, times("9:00 AM", "9:00 PM", None, None));

        let predictions = vec![
            tide((2024, 6, 2), "9:10 AM", TideKind::Low),
            tide((2024, 6, 1), "9:10 AM", TideKind::Low),
        ];
        let events = enrich(&predictions, &location(), 1.0, &provider);

        assert_eq!(events[0].prediction.date(), d2);
        assert!(events[0].near_sunrise_or_sunset);
        assert_eq!(events[1].prediction.date(), d1);
        assert!(!events[1].near_sunrise_or_sunset);
    }

    #[test]
    fn enrich_raw_skips_malformed_rows() {
        let provider = FixedTimesProvider::new(times("6:30 AM", "7:45 PM", None, None));
        let raw = vec![
            RawPrediction {
                t: "2024-06-01 06:00".to_string(),
                v: "0.105".to_string(),
                kind: "L".to_string(),
            },
            RawPrediction {
                t: "not a time".to_string(),
                v: "1.0".to_string(),
                kind: "H".to_string(),
            },
            RawPrediction {
                t: "2024-06-01 12:14".to_string(),
                v: "2.871".to_string(),
                kind: "H".to_string(),
            },
        ];
        let events = enrich_raw(&raw, &location(), 2.0, &provider);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].prediction.kind, TideKind::Low);
        assert_eq!(events[1].prediction.kind, TideKind::High);
    }

    #[test]
    fn next_alert_picks_earliest_future_entry() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let alert = |d: NaiveDate, time: &str| AlertEntry {
            date: d,
            time: t(time),
            category: AlertCategory::Sunrise,
        };
        let alerts = vec![
            alert(date.succ_opt().unwrap(), "5:00 AM"),
            alert(date, "4:00 AM"),
            alert(date, "9:00 PM"),
        ];
        let now = date.and_time(t("12:00 PM"));
        assert_eq!(next_alert(&alerts, now), Some(alert(date, "9:00 PM")));

        let later = date.succ_opt().unwrap().and_time(t("6:00 AM"));
        assert_eq!(next_alert(&alerts, later), None);
    }
}
