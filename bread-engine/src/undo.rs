// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot undo buffer (`old/`)
//!
//! Holds the pre-rollback state of every subvolume the last rollback
//! overwrote. Starting a new rollback empties it; it is not a stack.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use bread_btrfs::SnapshotStore;

use crate::error::Result;

/// Where a subvolume instance sits during a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubvolumeState {
    /// Mounted path under the top-level tree
    Live,
    /// Moved out of the way, not yet rotated back
    Detached,
    /// Inside the undo buffer
    UndoHeld,
}

impl fmt::Display for SubvolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubvolumeState::Live => "live",
            SubvolumeState::Detached => "detached",
            SubvolumeState::UndoHeld => "undo-held",
        };
        f.write_str(label)
    }
}

pub struct UndoBuffer {
    dir: PathBuf,
}

impl UndoBuffer {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, subvolume: &str) -> PathBuf {
        self.dir.join(subvolume)
    }

    fn names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Subvolumes currently held, sorted. Missing buffer means none.
    pub fn held(&self, store: &dyn SnapshotStore) -> Result<Vec<String>> {
        Ok(self
            .names()?
            .into_iter()
            .filter(|name| store.is_snapshot(&self.path_for(name)))
            .collect())
    }

    /// Delete everything held, then make sure the buffer exists. Returns
    /// the entries that could not be deleted; each failure is independent.
    pub fn clear(&self, store: &dyn SnapshotStore) -> Result<Vec<String>> {
        let mut stale = Vec::new();
        for name in self.names()? {
            let path = self.path_for(&name);
            match store.delete(&path) {
                Ok(()) => tracing::info!("Deleted {}", path.display()),
                Err(e) => {
                    tracing::warn!("Failed to clear {}: {}", path.display(), e);
                    stale.push(name);
                }
            }
        }
        fs::create_dir_all(&self.dir)?;
        Ok(stale)
    }
}
