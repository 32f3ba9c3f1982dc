//! Disk-backed JSON stores with time-to-live expiry.
//!
//! Each [`Cache`] owns one file in the cache directory and is always loaded
//! and written whole. Two expiry modes exist:
//!
//! - [`Cache::load`]: the file's `written_at` stamp decides. Once the file is
//!   older than the TTL it loads as empty, whatever the entries inside say.
//! - [`Cache::load_stamped`]: for record lists whose *last* record carries
//!   the fetch time (see [`Stamped`]); that stamp decides.
//!
//! Missing, unreadable and corrupt files load as empty. Writes go to a
//! temporary file which is then renamed over the old one. Rewriting a fresh
//! file keeps its `written_at`, so a store rewritten every pass still expires
//! one TTL after it was first written.

use crate::utils::{clean_now, epoch_secs};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Records that may carry a fetch-time stamp.
pub trait Stamped {
    /// Epoch seconds the record list was fetched at, if this record holds it.
    fn stamp(&self) -> Option<f64>;
}

impl Stamped for crate::models::ScheduleEvent {
    fn stamp(&self) -> Option<f64> {
        self.timestamp
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    written_at: f64,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    written_at: f64,
    data: T,
}

/// A single TTL-expiring JSON file.
#[derive(Debug, Clone)]
pub struct Cache {
    path: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// A store named `name` inside `dir`, expiring after `ttl_secs`.
    pub fn new(dir: impl AsRef<Path>, name: &str, ttl_secs: u64) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}.json")),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_fresh(&self, stamp: f64, now: f64) -> bool {
        now - stamp < self.ttl.as_secs_f64()
    }

    async fn read<T: DeserializeOwned>(&self) -> Option<Envelope<T>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Cache file unavailable");
                return None;
            }
        };
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(env) => Some(env),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable cache file");
                None
            }
        }
    }

    /// Load the whole store, or `T::default()` once the file has expired.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load<T: DeserializeOwned + Default>(&self) -> T {
        let Some(env) = self.read::<T>().await else {
            return T::default();
        };
        if self.is_fresh(env.written_at, epoch_secs(clean_now())) {
            env.data
        } else {
            debug!("Cache file expired");
            T::default()
        }
    }

    /// Load a record list whose last record carries the fetch stamp.
    ///
    /// Returns `None` when the file is missing, empty, unstamped or expired.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load_stamped<T: DeserializeOwned + Stamped>(&self) -> Option<Vec<T>> {
        let env = self.read::<Vec<T>>().await?;
        let stamp = env.data.last()?.stamp()?;
        if self.is_fresh(stamp, epoch_secs(clean_now())) {
            Some(env.data)
        } else {
            debug!("Cache file expired");
            None
        }
    }

    /// Persist `data` as the whole store.
    ///
    /// The stamp of the file being replaced is carried over while that file
    /// is still fresh; an expired, missing or corrupt file gets a new one.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn write<T: Serialize>(&self, data: &T) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let now = epoch_secs(clean_now());
        let written_at = match self.read::<IgnoredAny>().await {
            Some(old) if self.is_fresh(old.written_at, now) => old.written_at,
            _ => now,
        };
        let json = serde_json::to_string_pretty(&EnvelopeRef { written_at, data })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Wrote cache file");
        Ok(())
    }
}
