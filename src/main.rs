//! # live_m3u
//!
//! Collects live-event stream manifests from sports schedule sites and
//! publishes them as an M3U playlist.
//!
//! ## Usage
//!
//! ```sh
//! live_m3u -c ./cache -o ./out
//! ```
//!
//! ## Architecture
//!
//! Each pass runs the same pipeline:
//! 1. **Cache**: earlier results are reloaded and republished
//! 2. **Schedule**: today's and tomorrow's matches come from the site API
//! 3. **Extraction**: events near kick-off are opened in a headless browser and
//!    the player's manifest request is captured
//! 4. **Output**: the published events are written as a playlist and a JSON dump
//!
//! With `--interval-secs` the pass repeats until interrupted, reusing one
//! browser and one store.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod browser;
mod cache;
mod cli;
mod config;
mod leagues;
mod models;
mod network;
mod outputs;
mod scrapers;
mod store;
mod utils;

use browser::ChromeSession;
use cli::Cli;
use network::Network;
use outputs::{STEM, json, m3u};
use scrapers::watchfooty::Watchfooty;
use store::UrlStore;
use utils::ensure_writable_dir;

/// Write both output files from the current published map.
async fn write_outputs(urls: &UrlStore, output_dir: &Path) {
    let published = urls.snapshot();

    if let Err(e) = m3u::write_playlist(&published, output_dir, STEM).await {
        error!(error = %e, "Failed to write playlist");
    }
    if let Err(e) = json::write_published(&published, output_dir, STEM).await {
        error!(error = %e, "Failed to write JSON");
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("live_m3u starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: both directories must be writable before a browser is started
    let cache_dir = args.cache_dir.to_string_lossy().into_owned();
    for dir in [args.output_dir.as_str(), cache_dir.as_str()] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    let config = config::load_config(args.config.as_deref()).await?;
    let net = Network::new(&config.http, args.max_pages)?;
    let urls = Arc::new(UrlStore::new());
    let scraper = Watchfooty::new(config, net, &args.cache_dir, Arc::clone(&urls));

    let session = ChromeSession::launch(args.chrome_path.clone(), args.headful).await?;
    info!(headful = args.headful, max_pages = args.max_pages, "Browser launched");

    let output_dir = Path::new(&args.output_dir);
    match args.interval_secs {
        None => {
            scraper.scrape(&session).await;
            write_outputs(&urls, output_dir).await;
        }
        Some(secs) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scraper.scrape(&session).await;
                        write_outputs(&urls, output_dir).await;
                        info!(published = urls.len(), next_in_secs = secs, "Pass complete");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        warn!("Interrupted; stopping");
                        break;
                    }
                }
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs(),
        published = urls.len(),
        "live_m3u finished"
    );

    Ok(())
}
