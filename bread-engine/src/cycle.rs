// SPDX-License-Identifier: GPL-3.0-only

//! One scheduled snapshot pass: capture, prune, track the kernel

use std::fs;

use bread_btrfs::SnapshotStore;
use bread_types::{CycleStats, RetentionConfig};

use crate::kernel::KernelTracker;
use crate::layout::Layout;
use crate::naming::Timestamp;
use crate::retention;
use crate::undo::UndoBuffer;

pub struct SnapshotCycle<'a> {
    layout: &'a Layout,
    retention: &'a RetentionConfig,
    store: &'a dyn SnapshotStore,
    kernels: &'a KernelTracker,
}

impl<'a> SnapshotCycle<'a> {
    pub fn new(
        layout: &'a Layout,
        retention: &'a RetentionConfig,
        store: &'a dyn SnapshotStore,
        kernels: &'a KernelTracker,
    ) -> Self {
        Self {
            layout,
            retention,
            store,
            kernels,
        }
    }

    /// Snapshot every subvolume in `subvolumes` at `now` and apply
    /// retention. Never fails; every problem lands in `errors`.
    ///
    /// `kernel_version` is the running kernel, backed up and recorded
    /// against `now` when at least one snapshot was created.
    pub fn run(&self, subvolumes: &[String], now: &Timestamp, kernel_version: &str) -> CycleStats {
        let mut stats = CycleStats::default();

        // Space held by the undo buffer is reclaimed first
        let undo = UndoBuffer::new(self.layout.undo_dir());
        match undo.clear(self.store) {
            Ok(stale) if !stale.is_empty() => {
                tracing::warn!("Undo buffer entries left behind: {}", stale.join(", "));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to clear undo buffer: {}", e),
        }

        if let Err(e) = fs::create_dir_all(self.layout.snapshot_dir()) {
            tracing::error!(
                "Cannot create {}: {}",
                self.layout.snapshot_dir().display(),
                e
            );
            stats.errors += 1;
            return stats;
        }

        let mut sorted = subvolumes.to_vec();
        sorted.sort();
        sorted.dedup();

        for subvolume in &sorted {
            stats.merge(self.capture(subvolume, now));

            match retention::prune_subvolume(self.store, self.layout, subvolume, self.retention) {
                Ok(pruned) => stats.merge(pruned),
                Err(e) => {
                    tracing::warn!("Retention pass for {} failed: {}", subvolume, e);
                    stats.errors += 1;
                }
            }
        }

        if stats.created > 0 {
            let tracked = self
                .kernels
                .backup(kernel_version)
                .and_then(|version| self.kernels.write_marker(now, &version));
            if let Err(e) = tracked {
                tracing::warn!("Failed to record kernel {}: {}", kernel_version, e);
                stats.errors += 1;
            }
        }

        if let Err(e) = self.kernels.prune() {
            tracing::warn!("Kernel backup prune failed: {}", e);
            stats.errors += 1;
        }

        tracing::info!("{}", stats);
        stats
    }

    fn capture(&self, subvolume: &str, now: &Timestamp) -> CycleStats {
        let mut stats = CycleStats::default();
        let dest = self.layout.snapshot_path(subvolume, now);
        if dest.exists() {
            tracing::debug!("{} already exists, skipping", dest.display());
            return stats;
        }

        match self
            .store
            .snapshot(&self.layout.live_path(subvolume), &dest, true)
        {
            Ok(()) => {
                tracing::info!("Snapshot {}", dest.display());
                stats.created += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to snapshot {}: {}", subvolume, e);
                stats.errors += 1;
            }
        }
        stats
    }
}
