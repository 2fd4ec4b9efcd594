//!
//! cohortdb storage module
//! -----------------------
//! Document-store abstraction behind the record service. Two seams are defined
//! as async traits so handlers never depend on a concrete backend:
//!
//! - [`AccountStore`]: the credential store (accounts, password hashes, static keys).
//! - [`StudentCollection`]: one collection of student records, one per cohort.
//!
//! The in-process implementations keep rows behind `parking_lot` locks and, when a
//! data folder is configured, snapshot themselves to `<root>/<collection>/snapshot.bin`
//! after each mutation. [`PartitionRegistry`] hands out one collection per cohort.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

mod io;
mod paths;
pub mod accounts;
pub mod collection;
pub mod registry;

pub use accounts::{Account, AccountStore, MemoryAccountStore, NewAccount};
pub use collection::{MemoryCollection, NewStudent, StudentCollection, StudentFilter, StudentPatch, StudentRecord};
pub use registry::PartitionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("snapshot io failed for {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("snapshot encoding failed for {path}: {source}")]
    Encoding { path: PathBuf, #[source] source: bincode::Error },
    #[error("unsupported snapshot version {found} in {path}")]
    SnapshotVersion { path: PathBuf, found: u32 },
    #[error("snapshot writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
    #[error("collection {0} is unavailable: its snapshot could not be loaded")]
    Unavailable(String),
    #[error("store call '{op}' timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a mutation did to the rows it was given.
pub(crate) enum Outcome<R> {
    /// Rows changed; the new state must be saved before it becomes visible.
    Changed(R),
    /// Rows untouched; nothing to save.
    Unchanged(R),
}

impl<R> Outcome<R> {
    pub(crate) fn into_inner(self) -> R {
        match self {
            Outcome::Changed(r) | Outcome::Unchanged(r) => r,
        }
    }
}

/// Run a store call, failing with [`StoreError::Timeout`] once `after` elapses.
pub async fn bounded<T>(after: Duration, op: &'static str, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout { op, after }),
    }
}
