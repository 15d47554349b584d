// SPDX-License-Identifier: GPL-3.0-only

//! Kernel backup tracking
//!
//! Each snapshot session that created at least one entry gets a marker
//! recording the running kernel. The kernel's boot artifacts are copied into
//! a per-version backup record so a rollback can put a bootable kernel back
//! even after the package manager removed it from `/boot`.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use bread_types::KernelRestore;

use crate::error::{EngineError, Result};
use crate::layout::{BootLayout, Layout};
use crate::naming::{self, Timestamp};
use crate::table;

/// Sets the boot loader's default entry
pub trait BootLoader {
    fn set_default(&self, kernel_image: &Path) -> Result<()>;
}

/// `grubby --set-default <image>`
pub struct Grubby;

impl BootLoader for Grubby {
    fn set_default(&self, kernel_image: &Path) -> Result<()> {
        let grubby = which::which("grubby")
            .map_err(|e| EngineError::BootLoader(format!("grubby not found: {}", e)))?;

        let output = Command::new(grubby)
            .arg("--set-default")
            .arg(kernel_image)
            .output()
            .map_err(|e| EngineError::BootLoader(format!("Failed to run grubby: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::BootLoader(format!(
                "grubby failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootArtifact {
    Kernel,
    Initramfs,
    Entry,
}

impl BootArtifact {
    const ALL: [BootArtifact; 3] = [
        BootArtifact::Kernel,
        BootArtifact::Initramfs,
        BootArtifact::Entry,
    ];

    /// File name inside a backup record
    fn backup_name(self) -> &'static str {
        match self {
            BootArtifact::Kernel => "vmlinuz",
            BootArtifact::Initramfs => "initramfs.img",
            BootArtifact::Entry => "bls.conf",
        }
    }

    fn boot_path(self, boot: &BootLayout, version: &str) -> PathBuf {
        match self {
            BootArtifact::Kernel => boot.kernel_image(version),
            BootArtifact::Initramfs => boot.initramfs(version),
            BootArtifact::Entry => boot.boot_entry(version),
        }
    }
}

pub struct KernelTracker {
    layout: Layout,
    boot: BootLayout,
    loader: Box<dyn BootLoader>,
}

impl KernelTracker {
    pub fn new(layout: Layout, boot: BootLayout, loader: Box<dyn BootLoader>) -> Self {
        Self {
            layout,
            boot,
            loader,
        }
    }

    pub fn has_backup(&self, version: &str) -> bool {
        self.layout.kernel_backup(version).is_dir()
    }

    /// Copy `version`'s boot artifacts into a backup record unless one
    /// already exists. Missing artifacts are skipped.
    pub fn backup(&self, version: &str) -> Result<String> {
        if self.has_backup(version) {
            tracing::debug!("Kernel {} already backed up", version);
            return Ok(version.to_string());
        }
        let dest = self.layout.kernel_backup(version);
        fs::create_dir_all(&dest)?;

        for artifact in BootArtifact::ALL {
            let src = artifact.boot_path(&self.boot, version);
            if !src.exists() {
                tracing::warn!("Skipping missing boot artifact {}", src.display());
                continue;
            }
            fs::copy(&src, dest.join(artifact.backup_name()))?;
        }

        tracing::info!("Backed up kernel {}", version);
        Ok(version.to_string())
    }

    pub fn write_marker(&self, timestamp: &Timestamp, version: &str) -> Result<()> {
        fs::create_dir_all(self.layout.snapshot_dir())?;
        fs::write(self.layout.marker_path(timestamp), version)?;
        Ok(())
    }

    /// `None` means the session predates kernel tracking.
    pub fn read_marker(&self, timestamp: &Timestamp) -> Result<Option<String>> {
        read_trimmed(&self.layout.marker_path(timestamp))
    }

    /// The kernel this engine placed in the boot directory, if any
    pub fn placed_kernel(&self) -> Result<Option<String>> {
        read_trimmed(&self.layout.restored_kernel_marker())
    }

    fn set_placed_kernel(&self, version: Option<&str>) -> Result<()> {
        let marker = self.layout.restored_kernel_marker();
        match version {
            Some(version) => fs::write(&marker, version)?,
            None => remove_file_if_exists(&marker)?,
        }
        Ok(())
    }

    /// Remove the previously placed kernel from the boot directory. A no-op
    /// when it is no longer there.
    pub fn clean_previous_restore(&self) -> Result<Option<String>> {
        let Some(previous) = self.placed_kernel()? else {
            return Ok(None);
        };
        if !self.boot.kernel_image(&previous).exists() {
            return Ok(None);
        }

        for artifact in BootArtifact::ALL {
            remove_file_if_exists(&artifact.boot_path(&self.boot, &previous))?;
        }
        tracing::info!("Removed previous bread kernel {} from boot", previous);
        Ok(Some(previous))
    }

    /// Make `version` the default boot entry, copying it back into the boot
    /// directory first if it is not there. At most one engine-placed kernel
    /// exists at a time.
    pub fn restore(&self, version: &str) -> Result<KernelRestore> {
        if !self.has_backup(version) {
            return Err(EngineError::KernelBackupMissing(version.to_string()));
        }
        let src_dir = self.layout.kernel_backup(version);

        self.clean_previous_restore()?;

        let kernel_image = self.boot.kernel_image(version);
        let outcome = if kernel_image.exists() {
            // System-managed kernel; nothing of ours occupies the boot dir now
            self.set_placed_kernel(None)?;
            KernelRestore::AlreadyPresent(version.to_string())
        } else {
            for artifact in BootArtifact::ALL {
                let src = src_dir.join(artifact.backup_name());
                if !src.exists() {
                    continue;
                }
                let dst = artifact.boot_path(&self.boot, version);
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&src, &dst)?;
            }
            self.set_placed_kernel(Some(version))?;
            tracing::info!("Restored kernel {} to boot", version);
            KernelRestore::Placed(version.to_string())
        };

        self.loader.set_default(&kernel_image)?;
        tracing::info!("Set default boot kernel: {}", version);
        Ok(outcome)
    }

    /// Drop markers whose session is gone, then every backup no surviving
    /// marker references. Returns the removed versions.
    pub fn prune(&self) -> Result<Vec<String>> {
        let snapshot_dir = self.layout.snapshot_dir();
        let live = table::build_table(&snapshot_dir)?.timestamps();

        let mut referenced = BTreeSet::new();
        match fs::read_dir(&snapshot_dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    let Some(timestamp) = entry
                        .file_name()
                        .to_str()
                        .and_then(naming::decode_marker)
                    else {
                        continue;
                    };

                    if live.contains(timestamp.as_str()) {
                        if let Some(version) = read_trimmed(&entry.path())? {
                            referenced.insert(version);
                        }
                    } else {
                        tracing::debug!("Removing orphaned kernel marker {}", timestamp);
                        fs::remove_file(entry.path())?;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut removed = Vec::new();
        let entries = match fs::read_dir(self.layout.boot_backup_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let version = entry.file_name().to_string_lossy().into_owned();
            if referenced.contains(&version) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    tracing::info!("Removed kernel backup {}", version);
                    removed.push(version);
                }
                Err(e) => tracing::warn!("Failed to remove kernel backup {}: {}", version, e),
            }
        }

        removed.sort();
        Ok(removed)
    }
}

fn read_trimmed(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let value = contents.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
