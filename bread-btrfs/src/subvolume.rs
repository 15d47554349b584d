// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};
use std::process::Command;

use bread_types::btrfs::{SubvolumeEntry, SubvolumeList};
use btrfsutil::subvolume::{DeleteFlags, SnapshotFlags, Subvolume};

use crate::error::{BtrfsError, Result};
use crate::store::SnapshotStore;

/// Manager for BTRFS subvolume operations on the top-level tree
pub struct SubvolumeManager {
    mount_point: PathBuf,
}

impl SubvolumeManager {
    /// Create a new SubvolumeManager for the given mount point
    pub fn new<P: Into<PathBuf>>(mount_point: P) -> Result<Self> {
        let mount_point = mount_point.into();

        // Verify the path is a BTRFS filesystem
        match Subvolume::try_from(mount_point.as_path()) {
            Ok(_) => Ok(Self { mount_point }),
            Err(e) => Err(BtrfsError::NotMounted(format!(
                "{}: {}",
                mount_point.display(),
                e
            ))),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// List all subvolumes in the filesystem
    pub fn list_all(&self) -> Result<SubvolumeList> {
        // The btrfsutil iterator fails with "Could not statfs" under pkexec,
        // so go through the command-line tool.
        let btrfs = which::which("btrfs")
            .map_err(|e| BtrfsError::CommandFailed(format!("btrfs not found: {}", e)))?;

        let output = Command::new(btrfs)
            .args(["subvolume", "list"])
            .arg(&self.mount_point)
            .output()
            .map_err(|e| BtrfsError::CommandFailed(format!("Failed to run btrfs command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BtrfsError::CommandFailed(format!(
                "btrfs command failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let list = parse_subvolume_list(&stdout);

        if list.subvolumes.is_empty() {
            tracing::warn!("No subvolumes found - output may not have been parsed correctly");
        }

        Ok(list)
    }

    /// Live top-level subvolumes, excluding the `reserved` names.
    pub fn discover_live(&self, reserved: &[&str]) -> Result<Vec<String>> {
        let names = self.list_all()?.live_names(reserved);
        tracing::debug!("Discovered live subvolumes: {:?}", names);
        Ok(names)
    }
}

impl SnapshotStore for SubvolumeManager {
    fn snapshot(&self, source: &Path, dest: &Path, read_only: bool) -> Result<()> {
        let source_subvol = Subvolume::try_from(source).map_err(|e| {
            BtrfsError::SubvolumeNotFound(format!("Source {}: {}", source.display(), e))
        })?;

        let mut flags = SnapshotFlags::empty();
        if read_only {
            flags |= SnapshotFlags::READ_ONLY;
        }

        source_subvol.snapshot(dest, flags, None).map_err(|e| {
            BtrfsError::OperationFailed(format!(
                "Failed to create snapshot from {} to {}: {}",
                source.display(),
                dest.display(),
                e
            ))
        })?;

        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let subvol = Subvolume::try_from(path)
            .map_err(|e| BtrfsError::SubvolumeNotFound(format!("{}: {}", path.display(), e)))?;

        subvol.delete(DeleteFlags::empty()).map_err(|e| {
            BtrfsError::OperationFailed(format!(
                "Failed to delete subvolume at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    fn is_snapshot(&self, path: &Path) -> bool {
        path.exists() && Subvolume::try_from(path).is_ok()
    }
}

/// Parse `btrfs subvolume list` output.
///
/// Lines look like `ID 256 gen 89534 top level 5 path root`; anything else
/// is skipped. Paths may contain spaces.
pub fn parse_subvolume_list(output: &str) -> SubvolumeList {
    let mut subvolumes = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 || parts[0] != "ID" {
            continue;
        }

        let id = parts[1].parse::<u64>().ok();
        let generation = parts
            .iter()
            .position(|&p| p == "gen")
            .and_then(|idx| parts.get(idx + 1))
            .and_then(|value| value.parse::<u64>().ok());
        let top_level = parts
            .windows(2)
            .position(|pair| pair == ["top", "level"])
            .and_then(|idx| parts.get(idx + 2))
            .and_then(|value| value.parse::<u64>().ok());

        // Find "path" keyword and take everything after it
        let Some(path_idx) = parts.iter().position(|&p| p == "path") else {
            continue;
        };
        let path = parts[path_idx + 1..].join(" ");
        let path = path.strip_prefix("<FS_TREE>/").unwrap_or(&path).to_string();
        if path.is_empty() {
            continue;
        }

        if let (Some(id), Some(generation), Some(top_level)) = (id, generation, top_level) {
            subvolumes.push(SubvolumeEntry {
                id,
                generation,
                top_level,
                path,
            });
        }
    }

    SubvolumeList { subvolumes }
}
