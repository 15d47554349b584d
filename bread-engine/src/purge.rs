// SPDX-License-Identifier: GPL-3.0-only

//! Remove everything bread ever wrote

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use bread_btrfs::SnapshotStore;
use bread_types::PurgeReport;

use crate::kernel::KernelTracker;
use crate::layout::Layout;

/// Delete snapshots, kernel markers and backups, the undo buffer, the
/// journal and `config_path`. Individual failures are counted and the
/// purge carries on.
pub fn purge(
    layout: &Layout,
    store: &dyn SnapshotStore,
    kernels: &KernelTracker,
    config_path: &Path,
) -> PurgeReport {
    let mut report = PurgeReport::default();

    clear_dir(&layout.snapshot_dir(), store, &mut report);

    match kernels.clean_previous_restore() {
        Ok(Some(version)) => {
            tracing::info!("Removed restored kernel {}", version);
            report.deleted += 1;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Failed to remove restored kernel: {}", e);
            report.errors += 1;
        }
    }

    remove_tree(&layout.boot_backup_dir(), &mut report);
    remove_file(&layout.restored_kernel_marker(), &mut report);
    clear_dir(&layout.undo_dir(), store, &mut report);
    remove_file(&layout.journal(), &mut report);
    remove_file(config_path, &mut report);

    tracing::info!("Purged {} items, {} errors", report.deleted, report.errors);
    report
}

/// Subvolumes go through the store, plain files are unlinked, then the
/// directory itself is removed.
fn clear_dir(dir: &Path, store: &dyn SnapshotStore, report: &mut PurgeReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", dir.display(), e);
            report.errors += 1;
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let result = if store.is_snapshot(&path) {
            store.delete(&path).map_err(|e| e.to_string())
        } else {
            fs::remove_file(&path).map_err(|e| e.to_string())
        };
        match result {
            Ok(()) => {
                tracing::info!("Deleted {}", path.display());
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", path.display(), e);
                report.errors += 1;
            }
        }
    }

    if let Err(e) = fs::remove_dir(dir) {
        tracing::warn!("Failed to remove {}: {}", dir.display(), e);
        report.errors += 1;
    }
}

fn remove_tree(path: &Path, report: &mut PurgeReport) {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!("Deleted {}", path.display());
            report.deleted += 1;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
            report.errors += 1;
        }
    }
}

fn remove_file(path: &Path, report: &mut PurgeReport) {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Deleted {}", path.display());
            report.deleted += 1;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
            report.errors += 1;
        }
    }
}
