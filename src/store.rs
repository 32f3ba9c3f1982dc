//! Published results shared with playlist generation.

use crate::models::{CacheEntry, CacheMap};
use std::sync::{Mutex, MutexGuard};

/// Successfully scraped entries, keyed like the result cache.
///
/// A scraper clears and reseeds its store at the start of every pass, then
/// adds each new success as it lands. Readers take a [`UrlStore::snapshot`].
#[derive(Debug, Default)]
pub struct UrlStore {
    inner: Mutex<CacheMap>,
}

impl UrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheMap> {
        // A panic mid-insert leaves the map itself intact.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the contents with `entries`.
    pub fn reset<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, CacheEntry)>,
    {
        let mut map = self.lock();
        map.clear();
        map.extend(entries);
    }

    pub fn insert(&self, key: String, entry: CacheEntry) {
        self.lock().insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> CacheMap {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> CacheEntry {
        CacheEntry {
            url: Some(url.to_string()),
            logo: "logo".to_string(),
            base: None,
            timestamp: 0.0,
            id: "Live.Event.us".to_string(),
            link: "link".to_string(),
        }
    }

    #[test]
    fn test_reset_replaces_contents() {
        let store = UrlStore::new();
        store.insert("old".into(), entry("a"));
        store.reset([("new".to_string(), entry("b"))]);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("new"));
    }

    #[test]
    fn test_insert_and_len() {
        let store = UrlStore::new();
        assert!(store.is_empty());
        store.insert("k".into(), entry("a"));
        store.insert("k".into(), entry("b"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()["k"].url.as_deref(), Some("b"));
    }
}
