//! Shared network plumbing for scrapers.
//!
//! [`Network`] bundles what every scraper needs from the outside world:
//! schedule requests with retries, mirror resolution, and the process-wide
//! gate that bounds how many browser pages are busy at once. The manifest
//! capture rule and its one-shot [`CaptureSlot`] live here too, since every
//! browser-driven scraper intercepts requests the same way.

use crate::api::{HttpFetch, get_with_backoff};
use crate::config::HttpConfig;
use futures::FutureExt;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, error, instrument, warn};
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static MANIFEST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.m3u8(?:$|[?#&/])").unwrap());

/// Whether an intercepted request URL is a media manifest worth capturing.
pub fn is_manifest_request(url: &str) -> bool {
    MANIFEST_RE.is_match(url)
}

/// HTTP client, retry policy and browser-page gate shared by all scrapers.
#[derive(Debug, Clone)]
pub struct Network {
    fetch: HttpFetch,
    mirror_timeout: Duration,
    max_retries: usize,
    retry_base_delay: Duration,
    pages: Arc<Semaphore>,
}

impl Network {
    pub fn new(http: &HttpConfig, max_pages: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            fetch: HttpFetch {
                client,
                timeout: Duration::from_millis(http.request_timeout_ms),
            },
            mirror_timeout: Duration::from_millis(http.mirror_timeout_ms),
            max_retries: http.max_retries,
            retry_base_delay: Duration::from_millis(http.retry_base_delay_ms),
            pages: Arc::new(Semaphore::new(max_pages.max(1))),
        })
    }

    /// GET `url` with query `params`; `None` on any failure after retries.
    pub async fn request(&self, url: &Url, params: &[(&str, String)]) -> Option<String> {
        get_with_backoff(&self.fetch, url, params, self.max_retries, self.retry_base_delay).await
    }

    /// Pick the first mirror, in list order, that answers with a 2xx or 3xx.
    ///
    /// All mirrors are checked concurrently.
    #[instrument(level = "info", skip_all, fields(mirrors = mirrors.len()))]
    pub async fn get_base(&self, mirrors: &[String]) -> Option<String> {
        let checks = mirrors.iter().map(|m| self.is_alive(m));
        let alive = join_all(checks).await;
        mirrors
            .iter()
            .zip(alive)
            .find_map(|(mirror, ok)| ok.then(|| mirror.clone()))
    }

    async fn is_alive(&self, mirror: &str) -> bool {
        let resp = self
            .fetch
            .client
            .get(mirror)
            .timeout(self.mirror_timeout)
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() || r.status().is_redirection() => {
                debug!(%mirror, status = %r.status(), "Mirror reachable");
                true
            }
            Ok(r) => {
                debug!(%mirror, status = %r.status(), "Mirror answered with failure status");
                false
            }
            Err(e) => {
                debug!(%mirror, error = %e, "Mirror unreachable");
                false
            }
        }
    }

    /// Run one unit of browser work under the shared page gate.
    ///
    /// A panic inside `work` is logged against `url_num` and turned into
    /// `T::default()`, so one bad event never takes down the pass.
    pub async fn safe_process<F, T>(&self, url_num: usize, work: F) -> T
    where
        F: Future<Output = T>,
        T: Default,
    {
        let _permit = match self.pages.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(url_num, error = %e, "Page gate closed");
                return T::default();
            }
        };

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(out) => out,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(url_num, error = %msg, "URL {url_num}) Panicked while processing");
                T::default()
            }
        }
    }
}

/// Single-use slot filled by the first manifest request a page makes.
///
/// Clones share the slot; the first [`CaptureSlot::offer`] with a matching
/// URL wins and every later offer is ignored.
#[derive(Debug, Clone)]
pub struct CaptureSlot {
    tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl CaptureSlot {
    /// A new slot and the receiver that resolves with the captured URL.
    pub fn channel() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Inspect an outgoing request; returns true if it filled the slot.
    pub fn offer(&self, url: &str) -> bool {
        if !is_manifest_request(url) {
            return false;
        }
        let Ok(mut guard) = self.tx.lock() else {
            return false;
        };
        match guard.take() {
            Some(tx) => tx.send(url.to_string()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(max_pages: usize) -> Network {
        let http = HttpConfig {
            mirror_timeout_ms: 2_000,
            max_retries: 0,
            ..HttpConfig::default()
        };
        Network::new(&http, max_pages).unwrap()
    }

    #[test]
    fn test_manifest_rule() {
        assert!(is_manifest_request("https://cdn.example.com/live/index.m3u8"));
        assert!(is_manifest_request("https://cdn.example.com/live/INDEX.M3U8?token=abc"));
        assert!(!is_manifest_request("https://cdn.example.com/live/seg-001.ts"));
        assert!(!is_manifest_request("https://cdn.example.com/m3u8player.js"));
    }

    #[tokio::test]
    async fn test_capture_slot_first_match_wins() {
        let (slot, rx) = CaptureSlot::channel();
        let other = slot.clone();
        assert!(!slot.offer("https://cdn.example.com/app.js"));
        assert!(other.offer("https://cdn.example.com/a.m3u8"));
        assert!(!slot.offer("https://cdn.example.com/b.m3u8"));
        assert_eq!(rx.await.unwrap(), "https://cdn.example.com/a.m3u8");
    }

    #[tokio::test]
    async fn test_get_base_prefers_list_order() {
        let mut down = mockito::Server::new_async().await;
        let mut up_a = mockito::Server::new_async().await;
        let mut up_b = mockito::Server::new_async().await;
        let _d = down.mock("GET", "/").with_status(503).create_async().await;
        let _a = up_a.mock("GET", "/").with_status(200).create_async().await;
        let _b = up_b.mock("GET", "/").with_status(200).create_async().await;

        let mirrors = vec![down.url(), up_a.url(), up_b.url()];
        assert_eq!(network(1).get_base(&mirrors).await, Some(up_a.url()));
    }

    #[tokio::test]
    async fn test_get_base_none_when_all_down() {
        let mut down = mockito::Server::new_async().await;
        let _d = down.mock("GET", "/").with_status(500).create_async().await;
        assert_eq!(network(1).get_base(&[down.url()]).await, None);
    }

    async fn explode() -> Option<u8> {
        panic!("page exploded")
    }

    #[tokio::test]
    async fn test_safe_process_isolates_panics() {
        let net = network(1);
        let out = net.safe_process(7, explode()).await;
        assert_eq!(out, None);

        // The permit was released, so the gate still admits work.
        let out = net.safe_process(8, async { Some(1u8) }).await;
        assert_eq!(out, Some(1));
    }
}
