//! JSON dump of the published map.

use crate::models::CacheMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `published` to `{output_dir}/{stem}.json`, pretty-printed and keyed
/// exactly like the result cache.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_published(
    published: &CacheMap,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(published)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = output_dir.join(format!("{stem}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), count = published.len(), "Wrote published events");

    Ok(path)
}
