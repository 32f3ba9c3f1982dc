//! Files written from the published map after every pass.
//!
//! # Submodules
//!
//! - [`m3u`]: Extended M3U playlist for IPTV players
//! - [`json`]: The published map itself, for other tooling
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── watchfooty.m3u8
//! └── watchfooty.json
//! ```

pub mod json;
pub mod m3u;

/// Stem shared by every output file of the watchfooty scraper.
pub const STEM: &str = "watchfooty";
