//! Scraper configuration.
//!
//! Every value has a built-in default, so a config file is optional. A YAML
//! file passed with `--config` only needs the keys it wants to override:
//!
//! ```yaml
//! mirrors:
//!   - https://www.watchfooty.st
//! results_ttl_secs: 7200
//! timeouts:
//!   capture_ms: 8000
//! ```

use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Schedule API base.
pub const API_URL: &str = "https://api.watchfooty.st";

/// Embed service that event stream links are rewritten onto.
pub const EMBED_BASE: &str = "https://spiderembed.top/embed";

/// TV-guide id used when no league metadata matches.
pub const DEFAULT_TVG_ID: &str = "Live.Event.us";

/// Icon used when neither the schedule nor the league table supplies a logo.
pub const FALLBACK_LOGO: &str = "https://www.watchfooty.st/favicon.png";

const MIRRORS: [&str; 3] = [
    "https://www.watchfooty.top",
    "https://www.watchfooty.st",
    "https://www.watchfooty.su",
];

// Australian football, baseball and rugby stay disabled.
const VALID_SPORTS: [&str; 11] = [
    "american-football",
    "basketball",
    "cricket",
    "darts",
    "fighting",
    "football",
    "golf",
    "hockey",
    "racing",
    "tennis",
    "volleyball",
];

/// Tunables for the watchfooty scraper.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub api_url: String,
    /// Candidate site bases, checked in order.
    pub mirrors: Vec<String>,
    pub embed_base: String,
    /// Raw `sport` values that may be scraped.
    pub valid_sports: Vec<String>,
    pub schedule_ttl_secs: u64,
    pub results_ttl_secs: u64,
    /// Events that started up to this many minutes ago are still scraped.
    pub window_before_mins: i64,
    /// Events starting within this many minutes are already scraped.
    pub window_after_mins: i64,
    pub default_tvg_id: String,
    pub fallback_logo: String,
    pub http: HttpConfig,
    pub timeouts: ExtractTimeouts,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            mirrors: MIRRORS.iter().map(|m| m.to_string()).collect(),
            embed_base: EMBED_BASE.to_string(),
            valid_sports: VALID_SPORTS.iter().map(|s| s.to_string()).collect(),
            schedule_ttl_secs: 19_800,
            results_ttl_secs: 10_800,
            window_before_mins: 30,
            window_after_mins: 5,
            default_tvg_id: DEFAULT_TVG_ID.to_string(),
            fallback_logo: FALLBACK_LOGO.to_string(),
            http: HttpConfig::default(),
            timeouts: ExtractTimeouts::default(),
        }
    }
}

/// HTTP behaviour for schedule requests and mirror checks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_ms: u64,
    pub mirror_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            mirror_timeout_ms: 5_000,
            max_retries: 2,
            retry_base_delay_ms: 1_000,
        }
    }
}

/// Per-stage bounds for link extraction, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractTimeouts {
    pub navigate_ms: u64,
    pub settle_ms: u64,
    pub header_ms: u64,
    pub anchor_ms: u64,
    pub embed_ms: u64,
    pub capture_ms: u64,
}

impl Default for ExtractTimeouts {
    fn default() -> Self {
        Self {
            navigate_ms: 15_000,
            settle_ms: 2_000,
            header_ms: 5_000,
            anchor_ms: 3_000,
            embed_ms: 5_000,
            capture_ms: 6_000,
        }
    }
}

impl ExtractTimeouts {
    pub fn navigate(&self) -> Duration {
        Duration::from_millis(self.navigate_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn header(&self) -> Duration {
        Duration::from_millis(self.header_ms)
    }

    pub fn anchor(&self) -> Duration {
        Duration::from_millis(self.anchor_ms)
    }

    pub fn embed(&self) -> Duration {
        Duration::from_millis(self.embed_ms)
    }

    pub fn capture(&self) -> Duration {
        Duration::from_millis(self.capture_ms)
    }
}

/// Load configuration from an optional YAML file, falling back to defaults.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&Path>) -> Result<ScraperConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(ScraperConfig::default());
    };
    let raw = tokio::fs::read_to_string(path).await?;
    let config: ScraperConfig = serde_yaml::from_str(&raw)?;
    info!(path = %path.display(), mirrors = config.mirrors.len(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_site_constants() {
        let c = ScraperConfig::default();
        assert_eq!(c.schedule_ttl_secs, 19_800);
        assert_eq!(c.results_ttl_secs, 10_800);
        assert_eq!(c.window_before_mins, 30);
        assert_eq!(c.window_after_mins, 5);
        assert_eq!(c.mirrors.len(), 3);
        assert_eq!(c.timeouts.capture(), Duration::from_secs(6));
    }

    #[test]
    fn test_disabled_sports_are_not_valid() {
        let c = ScraperConfig::default();
        for sport in ["rugby", "baseball", "australian-football"] {
            assert!(!c.valid_sports.iter().any(|s| s == sport), "{sport} should be disabled");
        }
        assert!(c.valid_sports.iter().any(|s| s == "football"));
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = "results_ttl_secs: 60\ntimeouts:\n  capture_ms: 100\n";
        let c: ScraperConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.results_ttl_secs, 60);
        assert_eq!(c.timeouts.capture_ms, 100);
        assert_eq!(c.timeouts.navigate_ms, 15_000);
        assert_eq!(c.api_url, API_URL);
    }
}
