//! # Alert Scheduling
//!
//! Decides which [`AlertEntry`]s should be shown now, and remembers which ones
//! already were so a notification is never repeated.
//!
//! Both collaborators are explicit:
//! - an [`AlertStore`] holds the "already shown" state ([`MemoryStore`] for
//!   tests and one-shot runs, [`FileStore`] to persist across runs), and
//! - a [`Clock`] supplies "now" in station local time ([`SystemClock`] in
//!   production, [`FixedClock`] in tests).

use crate::AlertEntry;
use chrono::{Duration, FixedOffset, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Store key recording the most recently shown alert.
pub const LAST_SHOWN_KEY: &str = "last_alert_shown";

const SHOWN_PREFIX: &str = "shown:";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("alert state IO: {0}")]
    Io(#[from] io::Error),

    #[error("alert state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace alert state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// String key-value store for alert bookkeeping.
pub trait AlertStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Vec<String>;
}

/// Source of the current station-local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// In-memory store; state is lost when dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl AlertStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// JSON-file-backed store. The whole map is rewritten on every change, via a
/// temporary file in the same directory that replaces the old one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`; a missing file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Like [`FileStore::open`], but a file that is not valid JSON is logged
    /// and replaced by an empty store on the next write.
    pub fn open_or_reset<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        match Self::open(&path) {
            Err(StoreError::Json(error)) => {
                warn!(
                    %error,
                    path = %path.as_ref().display(),
                    "alert state unreadable, starting empty"
                );
                Ok(Self {
                    path: path.as_ref().to_path_buf(),
                    entries: BTreeMap::new(),
                })
            }
            other => other,
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries)?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl AlertStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Wall clock converted to a fixed station offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub offset: FixedOffset,
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Picks due alerts and records which were shown.
pub struct AlertScheduler<S: AlertStore, C: Clock> {
    store: S,
    clock: C,
    lead: Duration,
}

impl<S: AlertStore, C: Clock> AlertScheduler<S, C> {
    /// `lead` is how long before its time an alert becomes due.
    pub fn new(store: S, clock: C, lead: Duration) -> Self {
        Self { store, clock, lead }
    }

    pub fn is_shown(&self, alert: &AlertEntry) -> bool {
        self.store.get(&shown_key(alert)).is_some()
    }

    /// Unshown alerts whose time is after now and no more than `lead` away,
    /// soonest first.
    pub fn due_alerts(&self, alerts: &[AlertEntry]) -> Vec<AlertEntry> {
        let now = self.clock.now();
        let horizon = now + self.lead;
        let mut due: Vec<AlertEntry> = alerts
            .iter()
            .filter(|alert| {
                let at = alert.datetime();
                at > now && at <= horizon && !self.is_shown(alert)
            })
            .cloned()
            .collect();
        due.sort_by_key(AlertEntry::datetime);
        due
    }

    /// The soonest unshown alert still in the future.
    pub fn next_pending(&self, alerts: &[AlertEntry]) -> Option<AlertEntry> {
        let now = self.clock.now();
        alerts
            .iter()
            .filter(|alert| alert.datetime() > now && !self.is_shown(alert))
            .min_by_key(|alert| alert.datetime())
            .cloned()
    }

    /// Record that `alert` was shown to the user.
    ///
    /// Entries for alerts whose time has already passed are dropped.
    pub fn mark_shown(&mut self, alert: &AlertEntry) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.prune_before(now)?;

        let shown_at = now.format("%Y-%m-%dT%H:%M:%S").to_string();
        self.store.set(&shown_key(alert), shown_at)?;
        self.store.set(LAST_SHOWN_KEY, alert.key())?;
        debug!(alert = %alert.key(), "alert marked shown");
        Ok(())
    }

    fn prune_before(&mut self, now: NaiveDateTime) -> Result<(), StoreError> {
        let stale: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| shown_key_time(key).is_some_and(|at| at <= now))
            .collect();
        for key in &stale {
            self.store.remove(key)?;
        }
        if !stale.is_empty() {
            debug!(removed = stale.len(), "pruned past alert state");
        }
        Ok(())
    }

    /// Key of the most recently shown alert, if any.
    pub fn last_shown(&self) -> Option<String> {
        self.store.get(LAST_SHOWN_KEY)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn shown_key(alert: &AlertEntry) -> String {
    format!("{SHOWN_PREFIX}{}", alert.key())
}

/// Alert time encoded in a `shown:` key, e.g. `shown:2024-06-01T06:10:sunrise`.
fn shown_key_time(key: &str) -> Option<NaiveDateTime> {
    let alert_key = key.strip_prefix(SHOWN_PREFIX)?;
    let (stamp, _category) = alert_key.rsplit_once(':')?;
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M").ok()
}
