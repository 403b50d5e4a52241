//! # Fallback Tide Model
//!
//! This module provides a lunar-phase-aware mathematical fallback when NOAA predictions are
//! unavailable. It sums the two dominant semidiurnal constituents and reports the turning
//! points of the resulting curve as high and low tides, in the same raw shape NOAA returns,
//! so the rest of the pipeline cannot tell the difference except for the `offline` flag.
//!
//! ## Model Characteristics
//!
//! ### Semidiurnal Pattern
//! Most coastal areas experience semidiurnal tides (two high and two low tides per lunar day).
//! The model uses:
//! - **M2** (principal lunar): 12.42 h period, 1.375 m amplitude (Portland, ME)
//! - **S2** (principal solar): 12.00 h period, 0.207 m amplitude
//! - **Mean level**: 1.52 m above chart datum
//!
//! ### Lunar Phase & Amplitude
//! - The M2 phase is tied to the real-time clock plus a fixed lunitidal interval
//! - S2 is offset from M2 by twice the moon's phase angle, so the two constituents line up
//!   at new and full moon (spring tides) and oppose at the quarters (neap tides)
//!
//! ### Accuracy Trade-offs
//! - ✅ **Correct period**: Matches real semidiurnal tidal cycle
//! - ✅ **Spring–neap envelope**: Amplitude modulated by moon phase
//! - ❌ **No diurnal inequality**: Both daily highs reach the same height
//! - ❌ **Not station-synchronized**: Times can be off by hours for any real station
//!
//! The offline flag lets the report warn that these are approximations.

use crate::config::MAX_DAYS;
use crate::{ephemeris, lunar, Location, PredictionBatch, RawPrediction};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::f64::consts::TAU;
use tracing::warn;

// Lunar M2 constituent for Portland, ME (NOAA harmonics, converted to metres)
const A_M2_M: f64 = 1.375;
const P_M2_HRS: f64 = 12.42;

// Solar S2 constituent for Portland, ME
const A_S2_M: f64 = 0.207;

// High-water interval (Moon transit → local HW) ≈ 3 h 35 m
const LUNITIDAL_OFFSET_HRS: f64 = 3.59;

const MEAN_LEVEL_M: f64 = 1.524;

/// Sampling step used to locate turning points.
const STEP_MINUTES: i64 = 10;

/// Model water level in metres above chart datum at an instant.
pub fn water_level(instant: DateTime<Utc>) -> f64 {
    let period_secs = P_M2_HRS * 3600.0;
    let shifted = instant.timestamp() as f64 + LUNITIDAL_OFFSET_HRS * 3600.0;
    let theta_m2 = shifted.rem_euclid(period_secs) / period_secs * TAU;

    let moon_phase_angle = lunar::illumination(instant).phase * TAU;
    let theta_s2 = theta_m2 + 2.0 * moon_phase_angle;

    MEAN_LEVEL_M + A_M2_M * theta_m2.sin() + A_S2_M * theta_s2.sin()
}

/// Approximate hi/lo predictions for `days` local days starting at `begin`.
///
/// Timestamps are in the location's civil zone, formatted like NOAA's, and
/// heights are in metres. The returned batch is marked offline. Ranges longer
/// than [`MAX_DAYS`] are cut to that length.
pub fn approximate_predictions(
    location: &Location,
    begin: NaiveDate,
    days: u32,
) -> PredictionBatch {
    if days > MAX_DAYS {
        warn!(days, max = MAX_DAYS, "fallback range too long, truncating");
    }
    let days = days.min(MAX_DAYS);
    let offset = location.offset();
    let start = ephemeris::local_to_utc(begin, NaiveTime::default(), offset);
    let steps = i64::from(days) * 24 * 60 / STEP_MINUTES;

    // One extra sample either side so turning points at the edges are found.
    let samples: Vec<(NaiveDateTime, f64)> = (-1..=steps + 1)
        .map(|step| {
            let instant = start + Duration::minutes(step * STEP_MINUTES);
            (instant.with_timezone(&offset).naive_local(), water_level(instant))
        })
        .collect();

    let end = begin + Duration::days(i64::from(days));
    let mut predictions = Vec::new();
    for w in samples.windows(3) {
        let (prev, (at, height), next) = (w[0].1, w[1], w[2].1);
        let kind = if height > prev && height >= next {
            "H"
        } else if height < prev && height <= next {
            "L"
        } else {
            continue;
        };
        if at.date() < begin || at.date() >= end {
            continue;
        }
        predictions.push(RawPrediction {
            t: at.format("%Y-%m-%d %H:%M").to_string(),
            v: format!("{height:.3}"),
            kind: kind.to_string(),
        });
    }

    PredictionBatch {
        predictions,
        offline: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tide_data::parse_prediction;
    use crate::TideKind;
    use chrono::TimeZone;

    fn portland() -> Location {
        Location {
            name: "Portland, ME".to_string(),
            latitude: 43.6567,
            longitude: -70.2467,
            utc_offset_minutes: -300,
        }
    }

    #[test]
    fn test_level_changes_with_time() {
        let t0 = Utc.with_ymd_and_hms(2025, 7, 24, 0, 0, 0).unwrap();
        let quarter_period = Duration::minutes((P_M2_HRS * 60.0 / 4.0) as i64);

        let l0 = water_level(t0);
        let l1 = water_level(t0 + quarter_period);
        let l2 = water_level(t0 + quarter_period * 2);
        assert_ne!(l0, l1, "level should change with time");
        assert_ne!(l1, l2, "level should change with time");
        assert!((-0.2..=3.2).contains(&l0), "level {l0} outside model range");
    }

    #[test]
    fn test_extrema_alternate_and_parse() {
        let begin = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        let batch = approximate_predictions(&portland(), begin, 3);
        assert!(batch.offline);

        let parsed: Vec<_> = batch
            .predictions
            .iter()
            .map(|raw| parse_prediction(raw).expect("fallback rows must parse"))
            .collect();

        // ~3.86 turning points per day
        assert!(
            (10..=13).contains(&parsed.len()),
            "expected 10-13 extrema over 3 days, got {}",
            parsed.len()
        );
        for pair in parsed.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind, "highs and lows should alternate");
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for p in &parsed {
            assert!(p.date() >= begin && p.date() < begin + Duration::days(3));
        }
    }

    #[test]
    fn test_highs_above_lows() {
        let begin = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let parsed: Vec<_> = approximate_predictions(&portland(), begin, 2)
            .predictions
            .iter()
            .filter_map(|raw| parse_prediction(raw).ok())
            .collect();

        let min_high = parsed
            .iter()
            .filter(|p| p.kind == TideKind::High)
            .map(|p| p.height_meters)
            .fold(f64::INFINITY, f64::min);
        let max_low = parsed
            .iter()
            .filter(|p| p.kind == TideKind::Low)
            .map(|p| p.height_meters)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(min_high > max_low, "high {min_high} should exceed low {max_low}");
    }

    #[test]
    fn test_huge_range_is_truncated() {
        let begin = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let batch = approximate_predictions(&portland(), begin, u32::MAX);
        let last = parse_prediction(batch.predictions.last().unwrap()).unwrap();
        assert!(last.date() < begin + Duration::days(i64::from(MAX_DAYS)));
    }

    #[test]
    fn test_zero_days_is_empty() {
        let begin = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(approximate_predictions(&portland(), begin, 0).predictions.is_empty());
    }
}
