//! Latest status snapshot for external readers

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::{types::SystemStatus, utils::STATUS_DIR};

pub const STATUS_FILE: &str = "latest.json";

pub fn save_status_snapshot(status: &SystemStatus) -> Result<PathBuf> {
    save_status_snapshot_to(STATUS_DIR, status)
}

/// Overwrites `<dir>/latest.json`. The file is written beside the target
/// and renamed so readers never observe a partial document.
pub fn save_status_snapshot_to(dir: impl AsRef<Path>, status: &SystemStatus) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let target = dir.join(STATUS_FILE);
    let staging = dir.join(format!("{}.tmp", STATUS_FILE));
    fs::write(&staging, serde_json::to_vec_pretty(status)?)?;
    fs::rename(&staging, &target)?;

    debug!(
        path = %target.display(),
        open_breakers = status.open_breaker_count,
        "Saved status snapshot"
    );

    Ok(target)
}
