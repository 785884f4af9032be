//! Write-through JSON snapshots for the in-memory stores.
//! A snapshot file holds every row of one store; it is rewritten whole after each
//! mutation through a uniquely named sibling temp file that is then renamed into
//! place, so a crash never leaves a torn file behind. Callers serialize saves.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub version: u32,
    pub created_ms: i64,
    pub entries: Vec<T>,
}

/// Read all entries from `path`. A missing file is an empty store.
pub fn load_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() { return Ok(Vec::new()); }
    let bytes = std::fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    let snap: Snapshot<T> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    if snap.version != SNAPSHOT_VERSION {
        anyhow::bail!("unsupported snapshot version {} in {}", snap.version, path.display());
    }
    debug!(target: "bloggy::storage", "snapshot.load path='{}' entries={}", path.display(), snap.entries.len());
    Ok(snap.entries)
}

pub fn save_entries<T: Serialize>(path: &Path, entries: &[T]) -> Result<()> {
    #[derive(Serialize)]
    struct SnapshotRef<'a, T> { version: u32, created_ms: i64, entries: &'a [T] }

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating snapshot dir {}", dir.display()))?;
    let snap = SnapshotRef { version: SNAPSHOT_VERSION, created_ms: chrono::Utc::now().timestamp_millis(), entries };
    let bytes = serde_json::to_vec_pretty(&snap)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(&bytes).with_context(|| format!("writing snapshot {}", tmp.path().display()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error).with_context(|| format!("replacing snapshot {}", path.display()))?;
    debug!(target: "bloggy::storage", "snapshot.save path='{}' entries={}", path.display(), entries.len());
    Ok(())
}
