//! Extended M3U playlist of the published events.
//!
//! One entry per published key, earliest start first:
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1 tvg-chno="1" tvg-id="Soccer.Dummy.us" tvg-name="[Football] A vs B" tvg-logo="..." group-title="Football",[Football] A vs B (WATCHFTY)
//! #EXTVLCOPT:http-referrer=https://spiderembed.top/
//! #EXTVLCOPT:http-origin=https://spiderembed.top
//! https://cdn.example.com/hls/a/index.m3u8
//! ```

use crate::models::{CacheEntry, CacheMap};
use itertools::Itertools;
use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

const DEFAULT_GROUP: &str = "Live Events";

/// Origin of the embed page, which players must send as referrer.
fn embed_origin(base: &str) -> Option<String> {
    let url = Url::parse(base).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// `[Sport] Event (TAG)` -> (`Sport`, `[Sport] Event`).
fn split_key(key: &str) -> (Option<&str>, &str) {
    let name = match key.rfind(" (") {
        Some(i) if key.ends_with(')') => &key[..i],
        _ => key,
    };
    let sport = name
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(sport, _)| sport)
        .filter(|s| !s.is_empty());
    (sport, name)
}

fn attr(value: &str) -> String {
    value.replace('"', "'")
}

/// Render `published` as an extended M3U document.
///
/// Entries without a manifest are skipped. Ties on start time are broken by
/// key so the output is stable between passes.
pub fn render_playlist(published: &CacheMap) -> String {
    let mut out = String::from("#EXTM3U\n");

    let playable = published
        .iter()
        .filter_map(|(key, entry)| entry.url.as_deref().map(|url| (key, entry, url)))
        .sorted_by(|(ka, a, _), (kb, b, _)| a.timestamp.total_cmp(&b.timestamp).then_with(|| ka.cmp(kb)));

    for (chno, (key, entry, url)) in (1..).zip(playable) {
        write_entry(&mut out, chno, key, entry, url);
    }
    out
}

fn write_entry(out: &mut String, chno: usize, key: &str, entry: &CacheEntry, url: &str) {
    let (sport, name) = split_key(key);
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "#EXTINF:-1 tvg-chno=\"{chno}\" tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{key}",
        attr(&entry.id),
        attr(name),
        attr(&entry.logo),
        attr(sport.unwrap_or(DEFAULT_GROUP)),
    );
    if let Some(origin) = entry.base.as_deref().and_then(embed_origin) {
        let _ = writeln!(out, "#EXTVLCOPT:http-referrer={origin}/");
        let _ = writeln!(out, "#EXTVLCOPT:http-origin={origin}");
    }
    let _ = writeln!(out, "{url}");
}

/// Write the playlist to `{output_dir}/{stem}.m3u8`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_playlist(
    published: &CacheMap,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let playlist = render_playlist(published);
    debug!(bytes = playlist.len(), "Rendered playlist");

    fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("{stem}.m3u8"));
    fs::write(&path, playlist).await?;
    info!(path = %path.display(), count = published.len(), "Wrote playlist");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: Option<&str>, ts: f64, base: Option<&str>) -> CacheEntry {
        CacheEntry {
            url: url.map(str::to_string),
            logo: "https://example.com/logo.png".to_string(),
            base: base.map(str::to_string),
            timestamp: ts,
            id: "Soccer.Dummy.us".to_string(),
            link: "https://www.watchfooty.st/stream/x".to_string(),
        }
    }

    #[test]
    fn test_split_key() {
        assert_eq!(
            split_key("[Football] A vs B (WATCHFTY)"),
            (Some("Football"), "[Football] A vs B")
        );
        assert_eq!(split_key("plain"), (None, "plain"));
    }

    #[test]
    fn test_embed_origin() {
        assert_eq!(
            embed_origin("https://spiderembed.top/embed/abc/1").as_deref(),
            Some("https://spiderembed.top")
        );
        assert_eq!(embed_origin("not a url"), None);
    }

    #[test]
    fn test_render_sorted_by_start_then_key() {
        let mut map = CacheMap::new();
        map.insert("[Tennis] Late (WATCHFTY)".into(), entry(Some("https://c/late.m3u8"), 200.0, None));
        map.insert("[Football] B (WATCHFTY)".into(), entry(Some("https://c/b.m3u8"), 100.0, None));
        map.insert("[Football] A (WATCHFTY)".into(), entry(Some("https://c/a.m3u8"), 100.0, None));
        map.insert("[Darts] Failed (WATCHFTY)".into(), entry(None, 50.0, None));

        let out = render_playlist(&map);
        let urls: Vec<&str> = out.lines().filter(|l| l.starts_with("https://")).collect();
        assert_eq!(urls, vec!["https://c/a.m3u8", "https://c/b.m3u8", "https://c/late.m3u8"]);
        assert!(out.starts_with("#EXTM3U\n"));
        assert!(!out.contains("Failed"));
        assert!(out.contains("tvg-chno=\"3\""));
    }

    #[test]
    fn test_render_headers_from_base() {
        let mut map = CacheMap::new();
        map.insert(
            "[Football] A vs B (WATCHFTY)".into(),
            entry(Some("https://c/a.m3u8"), 1.0, Some("https://spiderembed.top/embed/a/1")),
        );

        let out = render_playlist(&map);
        assert!(out.contains("group-title=\"Football\",[Football] A vs B (WATCHFTY)"));
        assert!(out.contains("tvg-name=\"[Football] A vs B\""));
        assert!(out.contains("#EXTVLCOPT:http-referrer=https://spiderembed.top/\n"));
        assert!(out.contains("#EXTVLCOPT:http-origin=https://spiderembed.top\n"));
    }
}
