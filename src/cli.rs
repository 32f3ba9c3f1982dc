//! Command-line interface definitions for live_m3u.
//!
//! Every option can also be supplied through the environment variable named
//! next to it, which is how the scraper is usually run under a scheduler.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the live_m3u scraper.
///
/// # Examples
///
/// ```sh
/// # One pass, caches and playlist under the working directory
/// live_m3u -c ./cache -o ./out
///
/// # Keep running, one pass every ten minutes, with a config override
/// live_m3u -c ./cache -o ./out --config scraper.yaml --interval-secs 600
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the result and schedule caches
    #[arg(short, long, env = "LIVE_M3U_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Directory the playlist and JSON dump are written to
    #[arg(short, long, env = "LIVE_M3U_OUTPUT_DIR", default_value = "out")]
    pub output_dir: String,

    /// Optional YAML file overriding scraper defaults
    #[arg(long, env = "LIVE_M3U_CONFIG")]
    pub config: Option<PathBuf>,

    /// Browser pages allowed to work at the same time
    #[arg(long, env = "LIVE_M3U_MAX_PAGES", default_value_t = 2)]
    pub max_pages: usize,

    /// Rerun the scrape every N seconds instead of exiting after one pass
    #[arg(long, env = "LIVE_M3U_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    /// Chrome or Chromium executable; autodetected when omitted
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, env = "LIVE_M3U_HEADFUL")]
    pub headful: bool,
}
