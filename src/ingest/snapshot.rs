// src/ingest/snapshot.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// `projectzerothree_YYYYmmdd_HHMMSS.json`, UTC.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("projectzerothree_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write the raw payload, pretty-printed, into `dir` (created if missing).
pub fn save_snapshot(payload: &Value, dir: &Path) -> Result<PathBuf> {
    save_snapshot_at(payload, dir, Utc::now())
}

pub fn save_snapshot_at(payload: &Value, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating snapshot dir {}", dir.display()))?;
    let path = dir.join(snapshot_file_name(at));
    let body = serde_json::to_string_pretty(payload).context("serializing snapshot")?;
    std::fs::write(&path, body).with_context(|| format!("writing snapshot {}", path.display()))?;
    tracing::info!(target: "ingest", path = %path.display(), "snapshot saved");
    Ok(path)
}
