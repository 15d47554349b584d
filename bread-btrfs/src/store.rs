// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use crate::error::Result;

/// Copy-on-write snapshot primitive the engine delegates to.
///
/// Implementations must not touch anything besides the paths they are
/// handed. Batch callers treat every error as local to one path.
pub trait SnapshotStore {
    /// Snapshot `source` at `dest`; `dest` must not exist yet.
    fn snapshot(&self, source: &Path, dest: &Path, read_only: bool) -> Result<()>;

    /// Delete the subvolume at `path`.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Whether `path` exists and is a subvolume this store can delete.
    fn is_snapshot(&self, path: &Path) -> bool;
}
