//! Data models for schedule records, scrape candidates and cached results.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ScheduleEvent`]: Raw match record as served by the schedule API
//! - [`CandidateEvent`]: A schedule record that survived filtering and will be scraped
//! - [`CacheEntry`]: A scrape result (successful or not), persisted between runs
//!
//! Schedule records keep the API's camelCase field names on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Cached results keyed by [`cache_key`].
pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Build the composite key `[sport] event (TAG)` identifying one scraped event.
pub fn cache_key(sport: &str, event: &str, tag: &str) -> String {
    format!("[{sport}] {event} ({tag})")
}

/// A match record from the schedule API.
///
/// Every field is optional because the API is not trusted to be complete; the
/// event filter discards records missing the fields it needs. The API's own
/// `timestamp` is moved to `ts` on ingest so that `timestamp` can carry the
/// fetch time on the last record of a cached schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Upstream event timestamp, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    /// Fetch time in epoch seconds; only set on the last record of a schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl ScheduleEvent {
    /// The placeholder record stored when no schedule could be fetched.
    pub fn sentinel(fetched_at: f64) -> Self {
        Self {
            timestamp: Some(fetched_at),
            ..Self::default()
        }
    }
}

/// A match record exactly as the API serves it, before `timestamp` is renamed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatch {
    #[serde(default, deserialize_with = "string_or_number")]
    pub match_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl From<ApiMatch> for ScheduleEvent {
    fn from(m: ApiMatch) -> Self {
        Self {
            match_id: m.match_id,
            title: m.title,
            league: m.league,
            sport: m.sport,
            date: m.date,
            poster: m.poster,
            ts: m.timestamp,
            timestamp: None,
        }
    }
}

/// A schedule record selected for link extraction during one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    /// Display sport category taken from the league string.
    pub sport: String,
    /// Display name of the event.
    pub event: String,
    /// Absolute URL of the event page on the resolved mirror.
    pub link: String,
    /// Absolute poster URL, if the schedule supplied one.
    pub logo: Option<String>,
    /// Event start in epoch seconds.
    pub timestamp: f64,
}

/// A persisted scrape result. `url` is `None` when extraction failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: Option<String>,
    pub logo: String,
    /// Embed page the manifest was captured from.
    pub base: Option<String>,
    pub timestamp: f64,
    pub id: String,
    pub link: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
