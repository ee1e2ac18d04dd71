//! Filesystem probes shared by the validator and the orchestrator.
//!
//! Pure queries only: existence checks, directory listings, and JSON
//! reads. Absence is never an error here; failing to read something that
//! exists is.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::fs;

/// Whether a path exists. Absence is a plain `false`, never an error.
pub async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Direct entry names of a directory, files and subdirectories alike,
/// in no particular order.
pub async fn read_dir_names(path: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(path)
        .await
        .with_context(|| format!("Failed to list directory: {}", path.display()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(names)
}

/// Read and parse a JSON file
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

/// File-name component of an archive-relative path
pub fn file_name(rel: &str) -> &str {
    Path::new(rel)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(rel)
}

/// Parent directory of an archive-relative path, when it has one
pub fn relative_parent(rel: &str) -> Option<&str> {
    Path::new(rel)
        .parent()
        .and_then(|parent| parent.to_str())
        .filter(|parent| !parent.is_empty())
}
