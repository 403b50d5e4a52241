//! # Tide Alerts Application Entry Point
//!
//! Fetches a week of NOAA high/low predictions (or falls back to the offline
//! model), correlates them with the sun and moon, prints a daily report, and
//! emits any low-tide alerts that are due and have not been shown before.
//!
//! ```text
//! tide-alerts [--config PATH] [--offline] [--days N]
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `tide_alerts=info,tide_alerts_lib=info`).

// Test modules
#[cfg(test)]
mod tests;

use anyhow::{bail, Context};
use chrono::Duration;
use std::env;
use std::path::PathBuf;
use tide_alerts_lib::alerts::{AlertScheduler, Clock, FileStore, SystemClock};
use tide_alerts_lib::astro::EphemerisProvider;
use tide_alerts_lib::config::{check_days, Config, CONFIG_FILE};
use tide_alerts_lib::{correlator, fallback, report, tide_data};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line options.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    offline: bool,
    days: Option<u32>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let path = iter.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--offline" => parsed.offline = true,
                "--days" => {
                    let value = iter.next().context("--days needs a number")?;
                    let days = value
                        .parse()
                        .with_context(|| format!("invalid --days value {value:?}"))?;
                    parsed.days = Some(check_days(days)?);
                }
                other => bail!("unknown argument {other:?}"),
            }
        }
        Ok(parsed)
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tide_alerts=info,tide_alerts_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse(env::args().skip(1))?;
    let config_path = args.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::load_from_path(&config_path);
    config.validate().context("invalid configuration")?;

    let location = config.station.location();
    let days = args.days.unwrap_or(config.correlation.days);
    let clock = SystemClock {
        offset: location.offset(),
    };
    let today = clock.now().date();

    let batch = if args.offline {
        info!("offline mode, using the approximate tide model");
        fallback::approximate_predictions(&location, today, days)
    } else {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(tide_data::fetch(&config, today, days))
            .unwrap_or_else(|error| {
                // Network errors are expected; keep going with synthetic data
                warn!(%error, "tide data fetch failed, falling back to offline model");
                fallback::approximate_predictions(&location, today, days)
            })
    };

    let window_hours = config.correlation.window_hours;
    let events = correlator::enrich_raw(
        &batch.predictions,
        &location,
        window_hours,
        &EphemerisProvider,
    );
    let alerts = correlator::upcoming_alerts(&events, window_hours);
    info!(events = events.len(), alerts = alerts.len(), "correlated predictions");

    print!("{}", report::render_daily(&events, &location, batch.offline));
    println!();
    print!("{}", report::render_alerts(&alerts));

    let state_path = &config.alerts.state_path;
    let store = FileStore::open_or_reset(state_path)
        .with_context(|| format!("opening alert state {}", state_path.display()))?;
    let lead = Duration::minutes(config.alerts.lead_minutes);
    let mut scheduler = AlertScheduler::new(store, clock, lead);

    for alert in scheduler.due_alerts(&alerts) {
        println!(
            "🔔 Low tide at {} near {}",
            correlator::format_clock_time(alert.time),
            alert.category
        );
        scheduler.mark_shown(&alert)?;
    }
    if let Some(next) = scheduler.next_pending(&alerts) {
        info!(alert = %next.key(), "next pending alert");
    }

    Ok(())
}
