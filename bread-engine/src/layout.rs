// SPDX-License-Identifier: GPL-3.0-only

//! On-disk layout of the top-level tree and the boot directory

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::naming::{self, Timestamp};

pub const DEFAULT_MOUNT_POINT: &str = "/mnt/_bread";
pub const SNAPSHOT_DIR_NAME: &str = "_bread_snapshots";
pub const UNDO_DIR_NAME: &str = "old";
pub const BOOT_BACKUP_DIR_NAME: &str = "_bread_boot";
pub const RESTORED_KERNEL_MARKER: &str = ".bread_restored_kernel";
pub const JOURNAL_NAME: &str = ".bread_journal";

/// Top-level names that are never treated as live subvolumes
pub const RESERVED_NAMES: &[&str] = &[
    SNAPSHOT_DIR_NAME,
    BOOT_BACKUP_DIR_NAME,
    UNDO_DIR_NAME,
    "lost+found",
];

const MACHINE_ID_FILE: &str = "/etc/machine-id";

/// Paths under the mounted top-level subvolume (subvolid 5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    mount_point: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_POINT)
    }
}

impl Layout {
    pub fn new<P: Into<PathBuf>>(mount_point: P) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.mount_point.join(SNAPSHOT_DIR_NAME)
    }

    pub fn undo_dir(&self) -> PathBuf {
        self.mount_point.join(UNDO_DIR_NAME)
    }

    pub fn boot_backup_dir(&self) -> PathBuf {
        self.mount_point.join(BOOT_BACKUP_DIR_NAME)
    }

    pub fn restored_kernel_marker(&self) -> PathBuf {
        self.mount_point.join(RESTORED_KERNEL_MARKER)
    }

    pub fn journal(&self) -> PathBuf {
        self.mount_point.join(JOURNAL_NAME)
    }

    pub fn live_path(&self, subvolume: &str) -> PathBuf {
        self.mount_point.join(subvolume)
    }

    pub fn undo_path(&self, subvolume: &str) -> PathBuf {
        self.undo_dir().join(subvolume)
    }

    /// Scratch name used while rotating a subvolume during revert
    pub fn revert_temp_path(&self, subvolume: &str) -> PathBuf {
        self.mount_point.join(format!("{subvolume}_revert_tmp"))
    }

    pub fn snapshot_path(&self, subvolume: &str, timestamp: &Timestamp) -> PathBuf {
        self.snapshot_dir().join(naming::encode_entry(subvolume, timestamp))
    }

    pub fn marker_path(&self, timestamp: &Timestamp) -> PathBuf {
        self.snapshot_dir().join(naming::encode_marker(timestamp))
    }

    pub fn kernel_backup(&self, version: &str) -> PathBuf {
        self.boot_backup_dir().join(version)
    }
}

/// Where the boot loader reads kernels, initramfs images and BLS entries from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootLayout {
    boot_dir: PathBuf,
    entries_dir: PathBuf,
    machine_id: String,
}

impl BootLayout {
    pub fn new<P: Into<PathBuf>>(boot_dir: P, machine_id: impl Into<String>) -> Self {
        let boot_dir = boot_dir.into();
        let entries_dir = boot_dir.join("loader").join("entries");
        Self {
            boot_dir,
            entries_dir,
            machine_id: machine_id.into(),
        }
    }

    /// `/boot` with the machine id read from `/etc/machine-id`
    pub fn system() -> Result<Self> {
        let machine_id = std::fs::read_to_string(MACHINE_ID_FILE)?;
        Ok(Self::new("/boot", machine_id.trim()))
    }

    pub fn kernel_image(&self, version: &str) -> PathBuf {
        self.boot_dir.join(format!("vmlinuz-{version}"))
    }

    pub fn initramfs(&self, version: &str) -> PathBuf {
        self.boot_dir.join(format!("initramfs-{version}.img"))
    }

    pub fn boot_entry(&self, version: &str) -> PathBuf {
        self.entries_dir
            .join(format!("{}-{version}.conf", self.machine_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_follow_naming_convention() {
        let layout = Layout::default();
        let ts = Timestamp::parse("20240101T120000").expect("valid timestamp");

        assert_eq!(
            layout.snapshot_path("root", &ts),
            PathBuf::from("/mnt/_bread/_bread_snapshots/root.20240101T120000")
        );
        assert_eq!(
            layout.marker_path(&ts),
            PathBuf::from("/mnt/_bread/_bread_snapshots/.kernel.20240101T120000")
        );
        assert_eq!(layout.undo_path("home"), PathBuf::from("/mnt/_bread/old/home"));
        assert_eq!(
            layout.revert_temp_path("home"),
            PathBuf::from("/mnt/_bread/home_revert_tmp")
        );
    }

    #[test]
    fn boot_layout_uses_bls_names() {
        let boot = BootLayout::new("/boot", "abc123");

        assert_eq!(
            boot.kernel_image("6.8.0"),
            PathBuf::from("/boot/vmlinuz-6.8.0")
        );
        assert_eq!(
            boot.initramfs("6.8.0"),
            PathBuf::from("/boot/initramfs-6.8.0.img")
        );
        assert_eq!(
            boot.boot_entry("6.8.0"),
            PathBuf::from("/boot/loader/entries/abc123-6.8.0.conf")
        );
    }
}
