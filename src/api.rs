//! HTTP GET with exponential backoff retry logic.
//!
//! The schedule API is flaky enough that a single failed request should not
//! cost a whole schedule refresh. This module wraps plain `reqwest` GETs in a
//! retry decorator.
//!
//! # Architecture
//!
//! - [`FetchAsync`]: Core trait defining one async GET
//! - [`HttpFetch`]: Performs the request with `reqwest`, treating non-2xx as failure
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchAsync` implementation
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (0 disables retrying)
//! - Exponential backoff from a configurable base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use rand::{Rng, rng};
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Trait for a single async HTTP fetch.
pub trait FetchAsync {
    /// The type of response body returned.
    type Response;

    /// Fetch `url` once.
    async fn fetch(&self, url: &Url) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        debug!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1))
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// One `reqwest` GET returning the body text; non-2xx statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    pub client: Client,
    pub timeout: StdDuration,
}

impl FetchAsync for HttpFetch {
    type Response = String;

    async fn fetch(&self, url: &Url) -> Result<Self::Response, Box<dyn Error>> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.text().await?)
    }
}

/// GET `url` with `params` appended to its query, retrying on failure.
///
/// Returns `None` after logging if every attempt failed.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_with_backoff(
    fetch: &HttpFetch,
    url: &Url,
    params: &[(&str, String)],
    max_retries: usize,
    base_delay: StdDuration,
) -> Option<String> {
    let mut url = url.clone();
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }

    let t0 = Instant::now();
    let api = RetryFetch::new(fetch.clone(), max_retries, base_delay);
    match api.fetch(&url).await {
        Ok(body) => {
            debug!(%url, elapsed_ms_total = t0.elapsed().as_millis(), bytes = body.len(), "GET succeeded");
            Some(body)
        }
        Err(e) => {
            error!(%url, elapsed_ms_total = t0.elapsed().as_millis(), error = %e, "GET failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl FetchAsync for Flaky {
        type Response = &'static str;

        async fn fetch(&self, _url: &Url) -> Result<Self::Response, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err("boom".into());
            }
            Ok("ok")
        }
    }

    fn url() -> Url {
        Url::parse("http://localhost/").unwrap()
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let flaky = Flaky { failures_left: Cell::new(2), calls: Cell::new(0) };
        let retry = RetryFetch::new(flaky, 3, StdDuration::from_millis(1));
        assert_eq!(retry.fetch(&url()).await.unwrap(), "ok");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Flaky { failures_left: Cell::new(5), calls: Cell::new(0) };
        let retry = RetryFetch::new(flaky, 1, StdDuration::from_millis(1));
        assert!(retry.fetch(&url()).await.is_err());
        assert_eq!(retry.inner.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_get_with_backoff_appends_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/matches/all")
            .match_query(mockito::Matcher::UrlEncoded("date".into(), "2025-05-06".into()))
            .with_body("[]")
            .create_async()
            .await;

        let fetch = HttpFetch { client: Client::new(), timeout: StdDuration::from_secs(5) };
        let url = Url::parse(&server.url()).unwrap().join("api/v1/matches/all").unwrap();
        let body = get_with_backoff(
            &fetch,
            &url,
            &[("date", "2025-05-06".to_string())],
            0,
            StdDuration::from_millis(1),
        )
        .await;

        assert_eq!(body.as_deref(), Some("[]"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_with_backoff_non_success_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(500).create_async().await;

        let fetch = HttpFetch { client: Client::new(), timeout: StdDuration::from_secs(5) };
        let url = Url::parse(&server.url()).unwrap();
        let body = get_with_backoff(&fetch, &url, &[], 0, StdDuration::from_millis(1)).await;
        assert!(body.is_none());
    }
}
