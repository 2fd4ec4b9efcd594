use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{StoreError, StoreResult};
use crate::tprintln;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
    version: u32,
    created_ms: i64,
    entries: Vec<T>,
}

/// Read a snapshot written by [`save_snapshot`]. A missing file is `Ok(None)`.
pub(crate) fn load_snapshot<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<Vec<T>>> {
    if !path.exists() { return Ok(None); }
    let bytes = fs::read(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    let snap: Snapshot<T> = bincode::deserialize(&bytes)
        .map_err(|source| StoreError::Encoding { path: path.to_path_buf(), source })?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(StoreError::SnapshotVersion { path: path.to_path_buf(), found: snap.version });
    }
    tprintln!("snapshot.load path={} entries={}", path.display(), snap.entries.len());
    Ok(Some(snap.entries))
}

/// Write entries atomically: serialize to `<path>.tmp`, then rename over `path`.
pub(crate) fn save_snapshot<T: Serialize>(path: &Path, entries: &[T]) -> StoreResult<()> {
    #[derive(Serialize)]
    struct SnapshotRef<'a, T> {
        version: u32,
        created_ms: i64,
        entries: &'a [T],
    }

    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent() { fs::create_dir_all(dir).map_err(io_err)?; }
    let created_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
    let snap = SnapshotRef { version: SNAPSHOT_VERSION, created_ms, entries };
    let bytes = bincode::serialize(&snap).map_err(|source| StoreError::Encoding { path: path.to_path_buf(), source })?;
    let tmp = path.with_extension("bin.tmp");
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// [`save_snapshot`] on the blocking pool. Hands `entries` back once they are on disk.
pub(crate) async fn write_snapshot<T>(path: PathBuf, entries: Vec<T>) -> StoreResult<Vec<T>>
where
    T: Serialize + Send + 'static,
{
    tokio::task::spawn_blocking(move || save_snapshot(&path, &entries).map(|()| entries)).await?
}
