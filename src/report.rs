//! # Text Report
//!
//! Plain-text rendering of enriched tide events for the terminal. Events are
//! grouped by local date; each day lists its sun and moon times once, then
//! every tide with the events it falls near. Rendering only builds strings,
//! printing is left to the caller.

use crate::correlator::format_clock_time;
use crate::{AlertEntry, EnrichedTideEvent, Location};
use chrono::NaiveTime;
use std::fmt::Write;

const MISSING: &str = "--";

fn clock_or_missing(time: Option<NaiveTime>) -> String {
    time.map(format_clock_time)
        .unwrap_or_else(|| MISSING.to_string())
}

fn flags(event: &EnrichedTideEvent) -> Vec<&'static str> {
    let p = &event.proximity;
    [
        (p.sunrise, "sunrise"),
        (p.sunset, "sunset"),
        (p.moonrise, "moonrise"),
        (p.moonset, "moonset"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect()
}

/// Daily listing of `events`, which are expected in chronological order.
pub fn render_daily(events: &[EnrichedTideEvent], location: &Location, offline: bool) -> String {
    let mut out = String::new();

    if offline {
        out.push_str("⚠ OFFLINE (approximate tide model)\n\n");
    }
    let _ = writeln!(out, "Tides for {}", location.name);

    if events.is_empty() {
        out.push_str("\nNo predictions available.\n");
        return out;
    }

    let mut current_date = None;
    for event in events {
        let date = event.prediction.date();
        if current_date != Some(date) {
            current_date = Some(date);
            let astro = &event.astro;
            let _ = writeln!(out, "\n{}", date.format("%a %Y-%m-%d"));
            let _ = writeln!(
                out,
                "  Sun   rise {:>8}   set {:>8}",
                clock_or_missing(astro.sunrise),
                clock_or_missing(astro.sunset)
            );
            let _ = writeln!(
                out,
                "  Moon  rise {:>8}   set {:>8}   {} ({}%)",
                clock_or_missing(astro.moonrise),
                clock_or_missing(astro.moonset),
                astro.moon_phase_name(),
                astro.moon_illumination_percent
            );
        }

        let prediction = &event.prediction;
        let _ = write!(
            out,
            "  {:<4}  {:>8}  {:>6.2} m",
            prediction.kind,
            format_clock_time(prediction.time()),
            prediction.height_meters
        );
        let near = flags(event);
        if !near.is_empty() {
            let _ = write!(out, "   near {}", near.join(", "));
        }
        out.push('\n');
    }

    out
}

/// One line per alert, in the order given.
pub fn render_alerts(alerts: &[AlertEntry]) -> String {
    if alerts.is_empty() {
        return "No upcoming low-tide alerts.\n".to_string();
    }

    let mut out = String::from("Upcoming low-tide alerts:\n");
    for alert in alerts {
        let _ = writeln!(
            out,
            "  {} {:>8}  low tide near {}",
            alert.date.format("%a %Y-%m-%d"),
            format_clock_time(alert.time),
            alert.category
        );
    }
    out
}
