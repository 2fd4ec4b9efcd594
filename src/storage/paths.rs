use std::path::{Path, PathBuf};

/// Folder holding the credential store snapshot.
pub(crate) const ACCOUNTS_DIR: &str = "accounts";

#[inline]
pub(crate) fn collection_dir(root: &Path, collection: &str) -> PathBuf { root.join(collection) }

#[inline]
pub(crate) fn snapshot_path(root: &Path, collection: &str) -> PathBuf { collection_dir(root, collection).join("snapshot.bin") }

#[inline]
pub(crate) fn accounts_snapshot_path(root: &Path) -> PathBuf { snapshot_path(root, ACCOUNTS_DIR) }
