//! Browser automation seam.
//!
//! Scrapers talk to a browser only through [`BrowserSession`] and
//! [`EventPage`], which keeps extraction logic testable with scripted pages.
//! The production implementation drives Chrome through `headless_chrome`;
//! its calls are blocking, so each one runs on the blocking pool and is
//! bounded by `tokio::time::timeout` on top of Chrome's own timeout.
//!
//! Two guards give page work a guaranteed cleanup path:
//! - [`ScopedPage`] closes the page when dropped
//! - [`ListenerGuard`] detaches a request listener when dropped

use headless_chrome::browser::tab::EventListener;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Callback receiving the URL of every request a page makes.
pub type RequestListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`EventPage::on_request`], used to detach it again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(pub String);

#[derive(Debug)]
pub enum PageError {
    /// A bounded wait ran out.
    Timeout { stage: &'static str, after: Duration },
    /// The browser reported a failure.
    Browser(String),
    /// The page is gone.
    Closed,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::Timeout { stage, after } => write!(f, "{stage} timed out after {after:?}"),
            PageError::Browser(msg) => write!(f, "browser error: {msg}"),
            PageError::Closed => write!(f, "page closed"),
        }
    }
}

impl Error for PageError {}

/// One browser tab, as much of it as scrapers need.
pub trait EventPage {
    /// Navigate and wait for the document to load.
    async fn goto(&self, url: &str, limit: Duration) -> Result<(), PageError>;

    /// Wait for an element whose text contains `needle` (case-insensitive)
    /// and return its rendered text.
    async fn wait_for_text(&self, needle: &str, limit: Duration) -> Result<String, PageError>;

    /// Wait for an element matching the CSS `selector` and return its
    /// `attr` attribute, if set.
    async fn wait_for_attr(
        &self,
        selector: &str,
        attr: &str,
        limit: Duration,
    ) -> Result<Option<String>, PageError>;

    /// Call `listener` with the URL of every request the page makes from now on.
    fn on_request(&self, listener: RequestListener) -> Result<ListenerId, PageError>;

    /// Detach a listener added with [`EventPage::on_request`].
    fn remove_listener(&self, id: &ListenerId);

    fn close(&self);
}

/// A browser that can open [`EventPage`]s.
pub trait BrowserSession {
    type Page: EventPage;

    async fn new_page(&self) -> Result<Self::Page, PageError>;
}

/// Owns a page for the length of a scope and closes it on drop.
pub struct ScopedPage<P: EventPage> {
    page: P,
}

impl<P: EventPage> ScopedPage<P> {
    pub async fn open<S>(session: &S) -> Result<Self, PageError>
    where
        S: BrowserSession<Page = P>,
    {
        Ok(Self {
            page: session.new_page().await?,
        })
    }
}

impl<P: EventPage> Deref for ScopedPage<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.page
    }
}

impl<P: EventPage> Drop for ScopedPage<P> {
    fn drop(&mut self) {
        self.page.close();
    }
}

/// Detaches a request listener when dropped.
pub struct ListenerGuard<'a, P: EventPage> {
    page: &'a P,
    id: ListenerId,
}

impl<'a, P: EventPage> ListenerGuard<'a, P> {
    pub fn attach(page: &'a P, listener: RequestListener) -> Result<Self, PageError> {
        let id = page.on_request(listener)?;
        Ok(Self { page, id })
    }
}

impl<P: EventPage> Drop for ListenerGuard<'_, P> {
    fn drop(&mut self) {
        self.page.remove_listener(&self.id);
    }
}

// ---------------------------------------------------------------------------
// headless_chrome implementation
// ---------------------------------------------------------------------------

type CdpListener = dyn EventListener<Event> + Send + Sync;

/// A launched Chrome instance.
pub struct ChromeSession {
    browser: Browser,
}

impl ChromeSession {
    /// Launch Chrome, headless unless `headful` is set.
    #[instrument(level = "info")]
    pub async fn launch(chrome_path: Option<PathBuf>, headful: bool) -> Result<Self, PageError> {
        task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(!headful)
                .sandbox(false)
                .path(chrome_path)
                .idle_browser_timeout(Duration::from_secs(600))
                .build()
                .map_err(browser_err)?;
            let browser = Browser::new(options).map_err(browser_err)?;
            Ok::<_, PageError>(Self { browser })
        })
        .await
        .map_err(browser_err)?
    }
}

impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, PageError> {
        let browser = self.browser.clone();
        let tab = task::spawn_blocking(move || {
            let tab = browser.new_tab().map_err(browser_err)?;
            // requestWillBeSent is only emitted once the Network domain is on.
            tab.call_method(Network::Enable {
                max_total_buffer_size: None,
                max_resource_buffer_size: None,
                max_post_data_size: None,
                report_direct_socket_traffic: None,
                enable_durable_messages: None,
            })
            .map_err(browser_err)?;
            Ok::<_, PageError>(tab)
        })
        .await
        .map_err(browser_err)??;
        Ok(ChromePage {
            tab,
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicUsize::new(0),
        })
    }
}

/// A Chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
    listeners: Mutex<HashMap<String, Weak<CdpListener>>>,
    next_listener: AtomicUsize,
}

impl ChromePage {
    /// Run a blocking tab operation on the blocking pool, bounded by `limit`.
    async fn blocking<T, F>(&self, stage: &'static str, limit: Duration, op: F) -> Result<T, PageError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, PageError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        // Chrome enforces `limit` itself; the extra second covers CDP round trips.
        match timeout(limit + Duration::from_secs(1), task::spawn_blocking(move || op(tab))).await {
            Ok(Ok(res)) => res,
            Ok(Err(join)) if join.is_cancelled() => Err(PageError::Closed),
            Ok(Err(join)) => Err(PageError::Browser(join.to_string())),
            Err(_) => Err(PageError::Timeout { stage, after: limit }),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Weak<CdpListener>>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn browser_err(e: impl fmt::Display) -> PageError {
    PageError::Browser(e.to_string())
}

/// URL of an outgoing request, for request-start events only.
fn outgoing_request_url(event: &Event) -> Option<&str> {
    match event {
        Event::NetworkRequestWillBeSent(ev) => Some(&ev.params.request.url),
        _ => None,
    }
}

/// XPath for the innermost rendered element whose text contains `needle`.
///
/// Text is compared lower-cased over all descendant text nodes; script and
/// style contents never count.
fn text_xpath(needle: &str) -> String {
    const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
    let needle = needle.to_lowercase();
    let has_text = format!(
        "[not(self::script or self::style or self::title)]\
         [contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), '{needle}')]"
    );
    format!("//body//*{has_text}[not(.//*{has_text})]")
}

impl EventPage for ChromePage {
    async fn goto(&self, url: &str, limit: Duration) -> Result<(), PageError> {
        let url = url.to_string();
        self.blocking("navigation", limit, move |tab| {
            tab.set_default_timeout(limit);
            tab.navigate_to(&url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;
            Ok(())
        })
        .await
    }

    async fn wait_for_text(&self, needle: &str, limit: Duration) -> Result<String, PageError> {
        let xpath = text_xpath(needle);
        self.blocking("text wait", limit, move |tab| {
            let el = tab
                .wait_for_xpath_with_custom_timeout(&xpath, limit)
                .map_err(|_| PageError::Timeout { stage: "text wait", after: limit })?;
            el.get_inner_text().map_err(browser_err)
        })
        .await
    }

    async fn wait_for_attr(
        &self,
        selector: &str,
        attr: &str,
        limit: Duration,
    ) -> Result<Option<String>, PageError> {
        let selector = selector.to_string();
        let attr = attr.to_string();
        self.blocking("selector wait", limit, move |tab| {
            let el = tab
                .wait_for_element_with_custom_timeout(&selector, limit)
                .map_err(|_| PageError::Timeout { stage: "selector wait", after: limit })?;
            // Attributes come back flattened as [name, value, name, value, ...].
            let attrs = el.get_attributes().map_err(browser_err)?.unwrap_or_default();
            Ok(attrs
                .chunks(2)
                .find(|pair| pair.first() == Some(&attr))
                .and_then(|pair| pair.get(1).cloned()))
        })
        .await
    }

    // Adding and removing tab listeners only touches the tab's listener list;
    // no CDP round trip happens here.
    fn on_request(&self, listener: RequestListener) -> Result<ListenerId, PageError> {
        let id = format!("request-{}", self.next_listener.fetch_add(1, Ordering::SeqCst));
        let handler: Arc<CdpListener> = Arc::new(move |event: &Event| {
            if let Some(url) = outgoing_request_url(event) {
                listener(url);
            }
        });
        let weak = self.tab.add_event_listener(handler).map_err(browser_err)?;
        self.listeners().insert(id.clone(), weak);
        Ok(ListenerId(id))
    }

    fn remove_listener(&self, id: &ListenerId) {
        let Some(weak) = self.listeners().remove(&id.0) else {
            debug!(listener = %id.0, "Listener already detached");
            return;
        };
        if let Err(e) = self.tab.remove_event_listener(&weak) {
            debug!(listener = %id.0, error = %e, "Failed to detach listener");
        }
    }

    fn close(&self) {
        let tab = Arc::clone(&self.tab);
        let close = move || {
            if let Err(e) = tab.close(false) {
                warn!(error = %e, "Failed to close page");
            }
        };
        // Called from Drop, so there may be no runtime to hand the work to.
        match Handle::try_current() {
            Ok(rt) => {
                rt.spawn_blocking(close);
            }
            Err(_) => close(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_xpath_skips_scripts_and_prefers_innermost() {
        let xpath = text_xpath("Stream Links");
        assert!(xpath.starts_with("//body//*"));
        assert!(xpath.contains("'stream links'"));
        assert!(xpath.contains("normalize-space(.)"));
        assert!(!xpath.contains("text()"));
        assert!(xpath.contains("not(self::script or self::style or self::title)"));
        assert!(xpath.ends_with(")]"));
        assert!(xpath.contains("[not(.//*["));
    }

    #[test]
    fn test_request_start_events_carry_url() {
        let raw = serde_json::json!({
            "params": {
                "requestId": "1000.1",
                "loaderId": "L1",
                "documentURL": "https://spiderembed.top/embed/abc/1",
                "request": {
                    "url": "https://cdn.example.com/hls/abc/index.m3u8",
                    "method": "GET",
                    "headers": {},
                    "initialPriority": "High",
                    "referrerPolicy": "strict-origin-when-cross-origin"
                },
                "timestamp": 1.0,
                "wallTime": 1.0,
                "initiator": { "type": "script" },
                "redirectHasExtraInfo": false
            }
        });
        let ev = serde_json::from_value(raw).unwrap();
        let event = Event::NetworkRequestWillBeSent(ev);
        assert_eq!(
            outgoing_request_url(&event),
            Some("https://cdn.example.com/hls/abc/index.m3u8")
        );
    }
}
