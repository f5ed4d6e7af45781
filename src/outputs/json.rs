//! JSON archive of generated digests.
//!
//! Every generation cycle can be serialized as a [`Digest`] for consumption
//! by other tools.
//!
//! # Output Structure
//!
//! Files are grouped by the local date of generation and named after the
//! local time, so several runs per day never overwrite each other:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 081500.json
//!     └── 173002.json
//! ```

use crate::models::Digest;
use chrono::Local;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the JSON file for `digest` under `json_output_dir`.
pub fn digest_path(digest: &Digest, json_output_dir: &str) -> PathBuf {
    let local = digest.generated_at.with_timezone(&Local);
    PathBuf::from(json_output_dir)
        .join(local.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", local.format("%H%M%S")))
}

/// Write a [`Digest`] to a JSON file with date-based directory structure.
///
/// # Arguments
///
/// * `digest` - The finished generation cycle to serialize
/// * `json_output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;
    let path = digest_path(digest, json_output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON digest");
    Ok(path)
}
