//! Live-event scrapers.
//!
//! Each scraper owns its caches and publishes successful events into a
//! shared [`UrlStore`](crate::store::UrlStore) keyed `[Sport] Event (TAG)`.
//!
//! | Site | Module | Schedule | Extraction |
//! |------|--------|----------|------------|
//! | Watch Footy | [`watchfooty`] | JSON API, today and tomorrow | Headless browser, manifest request capture |

pub mod watchfooty;
