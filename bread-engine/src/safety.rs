// SPDX-License-Identifier: GPL-3.0-only

//! Boot configuration safety check
//!
//! Rollback replaces subvolumes with new ones, which get new IDs. A mount
//! entry that pins a btrfs subvolume by ID would then point at a deleted
//! subvolume (or the wrong one) on next boot.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

pub const FSTAB: &str = "/etc/fstab";

/// Non-comment lines that mount btrfs by `subvolid=`
pub fn find_volatile_mounts(fstab: &str) -> Vec<String> {
    fstab
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| line.contains("btrfs") && line.contains("subvolid="))
        .map(str::to_string)
        .collect()
}

pub struct SafetyGuard {
    fstab: PathBuf,
}

impl SafetyGuard {
    pub fn new<P: Into<PathBuf>>(fstab: P) -> Self {
        Self {
            fstab: fstab.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(FSTAB)
    }

    pub fn fstab(&self) -> &Path {
        &self.fstab
    }

    /// Offending lines. A missing fstab has none.
    pub fn inspect(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.fstab) {
            Ok(contents) => Ok(find_volatile_mounts(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, skipping mount check", self.fstab.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Gate a rollback on the fstab check. Offending lines are fatal unless
    /// `confirm` is given and accepts them.
    pub fn check<F>(&self, confirm: Option<F>) -> Result<()>
    where
        F: FnOnce(&[String]) -> bool,
    {
        let lines = self.inspect()?;
        if lines.is_empty() {
            return Ok(());
        }

        for line in &lines {
            tracing::warn!("fstab mounts a subvolume by ID: {}", line);
        }

        let Some(confirm) = confirm else {
            return Err(EngineError::UnsafeBootConfig(lines));
        };
        if !confirm(&lines) {
            return Err(EngineError::Cancelled);
        }
        tracing::warn!("Continuing despite subvolid= mounts");
        Ok(())
    }
}
