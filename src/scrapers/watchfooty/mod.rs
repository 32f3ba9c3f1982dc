//! Watch Footy live-event scraper.
//!
//! Watch Footy publishes a JSON schedule and one page per match; the page
//! links to an embed player whose manifest request is what we are after.
//!
//! # Pass structure
//!
//! 1. **Cache**: results from earlier passes are loaded and the successful
//!    ones are published straight away
//! 2. **Mirror**: the first reachable site mirror is chosen
//! 3. **Schedule**: the cached two-day schedule is filtered down to events
//!    around kick-off that have not been tried yet ([`filter`])
//! 4. **Extraction**: each event gets its own page and is processed one at a
//!    time under the shared page gate ([`extract`])
//! 5. **Persist**: every attempt, successful or not, is written back so it is
//!    not retried until the result cache expires
//!
//! Nothing here fails the caller; problems are logged and the pass carries on
//! or ends early with the cache written back.

pub mod extract;
pub mod filter;
pub mod schedule;

use crate::browser::{BrowserSession, ScopedPage};
use crate::cache::Cache;
use crate::config::ScraperConfig;
use crate::leagues;
use crate::models::{CacheEntry, CacheMap, CandidateEvent, cache_key};
use crate::network::Network;
use crate::store::UrlStore;
use crate::utils::clean_now;
use chrono::Duration;
use extract::{Capture, process_event};
use filter::{FilterContext, select_candidates};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Suffix of every cache key and cache file name of this scraper.
pub const TAG: &str = "WATCHFTY";

/// The scraper and its two caches.
pub struct Watchfooty {
    config: ScraperConfig,
    net: Network,
    results: Cache,
    schedule: Cache,
    urls: Arc<UrlStore>,
}

impl Watchfooty {
    pub fn new(config: ScraperConfig, net: Network, cache_dir: &Path, urls: Arc<UrlStore>) -> Self {
        let results = Cache::new(cache_dir, TAG, config.results_ttl_secs);
        let schedule = Cache::new(cache_dir, &format!("{TAG}-api"), config.schedule_ttl_secs);
        Self {
            config,
            net,
            results,
            schedule,
            urls,
        }
    }

    /// The store this scraper publishes into.
    pub fn urls(&self) -> &Arc<UrlStore> {
        &self.urls
    }

    fn entry_for(&self, ev: &CandidateEvent, capture: Option<Capture>) -> CacheEntry {
        let (tvg_id, pic) = leagues::get_tvg_info(&ev.sport, &ev.event);
        let (url, base) = match capture {
            Some(c) => (Some(c.manifest), Some(c.embed)),
            None => (None, None),
        };
        CacheEntry {
            url,
            logo: ev
                .logo
                .clone()
                .or_else(|| pic.map(str::to_string))
                .unwrap_or_else(|| self.config.fallback_logo.clone()),
            base,
            timestamp: ev.timestamp,
            id: tvg_id
                .map(str::to_string)
                .unwrap_or_else(|| self.config.default_tvg_id.clone()),
            link: ev.link.clone(),
        }
    }

    async fn persist(&self, cached: &CacheMap) {
        if let Err(e) = self.results.write(cached).await {
            error!(path = %self.results.path().display(), error = %e, "Failed to write result cache");
        }
    }

    /// Run one scrape pass, publishing into [`Watchfooty::urls`].
    #[instrument(level = "info", skip_all, fields(tag = TAG))]
    pub async fn scrape<S: BrowserSession>(&self, session: &S) {
        let mut cached: CacheMap = self.results.load().await;

        self.urls.reset(
            cached
                .iter()
                .filter(|(_, v)| v.url.is_some())
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let cached_count = self.urls.len();
        let mut valid_count = cached_count;
        info!(count = cached_count, "Loaded {cached_count} event(s) from cache");

        let Some(base_url) = self.net.get_base(&self.config.mirrors).await else {
            warn!("No working Watch Footy mirrors");
            self.persist(&cached).await;
            return;
        };
        info!(%base_url, "Scraping from \"{base_url}\"");

        let now = clean_now();
        let schedule =
            schedule::get_schedule(&self.net, &self.schedule, &self.config.api_url, now).await;

        let cached_keys: HashSet<String> = cached.keys().cloned().collect();
        let ctx = FilterContext {
            now,
            window_before: Duration::minutes(self.config.window_before_mins),
            window_after: Duration::minutes(self.config.window_after_mins),
            valid_sports: &self.config.valid_sports,
            cached_keys: &cached_keys,
            tag: TAG,
            base_url: &base_url,
            api_url: &self.config.api_url,
        };
        let events = select_candidates(&schedule, &ctx);
        info!(count = events.len(), "Processing {} new URL(s)", events.len());

        for (url_num, ev) in (1..).zip(&events) {
            let capture = match ScopedPage::open(session).await {
                Ok(page) => {
                    let work = process_event(
                        &*page,
                        &ev.link,
                        url_num,
                        &self.config.embed_base,
                        &self.config.timeouts,
                    );
                    self.net.safe_process(url_num, work).await
                }
                Err(e) => {
                    warn!(url_num, error = %e, "URL {url_num}) Could not open page");
                    None
                }
            };

            let key = cache_key(&ev.sport, &ev.event, TAG);
            let entry = self.entry_for(ev, capture);
            if entry.url.is_some() {
                valid_count += 1;
                self.urls.insert(key.clone(), entry.clone());
            }
            cached.insert(key, entry);
        }

        match valid_count - cached_count {
            0 => info!("No new events found"),
            new_count => info!(count = new_count, "Collected and cached {new_count} new event(s)"),
        }

        self.persist(&cached).await;
    }
}
