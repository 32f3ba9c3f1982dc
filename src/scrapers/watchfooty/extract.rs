//! Recovers a stream manifest URL from an event page.
//!
//! The event page lists stream links under a "Stream Links (N)" heading. The
//! first link is rewritten onto the embed service, and loading that embed
//! page makes the player request its `.m3u8` manifest, which a request
//! listener attached for the whole visit picks up.
//!
//! Every stage has its own time bound. Failures never escape: they are
//! logged against the event's sequence number and reported as `None`.

use crate::browser::{EventPage, ListenerGuard, PageError};
use crate::config::ExtractTimeouts;
use crate::network::CaptureSlot;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{info, instrument, warn};

static STREAM_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").unwrap());
static STREAM_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*/stream").unwrap());

const HEADER_TEXT: &str = "Stream Links";
const STREAM_ANCHOR: &str = r#"a[href*="/stream/"]"#;

/// A captured manifest and the embed page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub manifest: String,
    pub embed: String,
}

/// Why an extraction stopped early.
#[derive(Debug)]
enum Abort {
    Listener(PageError),
    Navigate(PageError),
    Header(PageError),
    NoStreams,
    Anchor(PageError),
    NoHref,
    Embed(PageError),
    CaptureTimeout,
    NoCapture,
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::Listener(e) => write!(f, "Could not listen for requests: {e}"),
            Abort::Navigate(e) => write!(f, "Could not load event page: {e}"),
            Abort::Header(e) => write!(f, "Can't find stream links header: {e}"),
            Abort::NoStreams | Abort::NoHref => write!(f, "No available stream links."),
            Abort::Anchor(e) => write!(f, "No available stream links: {e}"),
            Abort::Embed(e) => write!(f, "Could not load embed page: {e}"),
            Abort::CaptureTimeout => write!(f, "Timed out waiting for M3U8."),
            Abort::NoCapture => write!(f, "No M3U8 captured after waiting."),
        }
    }
}

/// Number in the first `(N)` of a header, e.g. `Stream Links (3)` -> 3.
pub fn stream_count(header: &str) -> Option<u32> {
    STREAM_COUNT.captures(header)?.get(1)?.as_str().parse().ok()
}

/// Rewrite everything up to and including the last `/stream` of `href`
/// onto `embed_base`, keeping the stream identifier that follows.
pub fn embed_url(href: &str, embed_base: &str) -> String {
    STREAM_PREFIX.replacen(href, 1, NoExpand(embed_base)).into_owned()
}

/// Bound one page call by `limit`, whatever the page does with it.
async fn bounded<T>(
    stage: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, PageError>>,
) -> Result<T, PageError> {
    timeout(limit, call)
        .await
        .unwrap_or(Err(PageError::Timeout { stage, after: limit }))
}

async fn run_stages<P: EventPage>(
    page: &P,
    url: &str,
    embed_base: &str,
    t: &ExtractTimeouts,
    captured: oneshot::Receiver<String>,
) -> Result<Capture, Abort> {
    bounded("navigation", t.navigate(), page.goto(url, t.navigate()))
        .await
        .map_err(Abort::Navigate)?;

    sleep(t.settle()).await;

    let header = bounded("header wait", t.header(), page.wait_for_text(HEADER_TEXT, t.header()))
        .await
        .map_err(Abort::Header)?;
    match stream_count(&header) {
        Some(n) if n > 0 => {}
        _ => return Err(Abort::NoStreams),
    }

    let href = bounded(
        "anchor wait",
        t.anchor(),
        page.wait_for_attr(STREAM_ANCHOR, "href", t.anchor()),
    )
    .await
    .map_err(Abort::Anchor)?
    .filter(|h| !h.is_empty())
    .ok_or(Abort::NoHref)?;

    let embed = embed_url(&href, embed_base);
    bounded("embed navigation", t.embed(), page.goto(&embed, t.embed()))
        .await
        .map_err(Abort::Embed)?;

    // Dropping the receiver on timeout is what cancels the wait.
    match timeout(t.capture(), captured).await {
        Ok(Ok(manifest)) => Ok(Capture { manifest, embed }),
        Ok(Err(_)) => Err(Abort::NoCapture),
        Err(_) => Err(Abort::CaptureTimeout),
    }
}

/// Drive `page` through one event and return the captured manifest.
///
/// The request listener is attached before the first navigation and is
/// detached when this function returns, however it returns.
#[instrument(level = "info", skip(page, embed_base, timeouts))]
pub async fn process_event<P: EventPage>(
    page: &P,
    url: &str,
    url_num: usize,
    embed_base: &str,
    timeouts: &ExtractTimeouts,
) -> Option<Capture> {
    let (slot, captured) = CaptureSlot::channel();
    let listener = Arc::new(move |req: &str| {
        slot.offer(req);
    });

    let result = match ListenerGuard::attach(page, listener) {
        Ok(_guard) => run_stages(page, url, embed_base, timeouts, captured).await,
        Err(e) => Err(Abort::Listener(e)),
    };

    match result {
        Ok(capture) => {
            info!(url_num, manifest = %capture.manifest, "URL {url_num}) Captured M3U8");
            Some(capture)
        }
        Err(abort) => {
            warn!(url_num, "URL {url_num}) {abort}");
            None
        }
    }
}
