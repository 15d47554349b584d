// SPDX-License-Identifier: GPL-3.0-only

//! Rollback and revert
//!
//! A rollback moves each selected live subvolume into the undo buffer and
//! puts a writable snapshot of the chosen session in its place. The archived
//! snapshot itself is never touched. A revert rotates the undo buffer back
//! into place, leaving the rolled-back state in the buffer, so a second
//! revert undoes the first.
//!
//! Rename is the smallest atomic step available. A crash between the steps
//! for one subvolume leaves that subvolume half swapped; the journal records
//! which step was running.

use std::fs;
use std::path::Path;

use bread_btrfs::SnapshotStore;
use bread_types::{KernelRestore, RevertReport, RollbackReport};

use crate::error::{EngineError, Result};
use crate::journal::{Journal, Operation, Step};
use crate::kernel::KernelTracker;
use crate::layout::Layout;
use crate::naming::Timestamp;
use crate::system;
use crate::table::{self, SnapshotTable};
use crate::undo::{SubvolumeState, UndoBuffer};

pub struct RollbackEngine<'a> {
    layout: &'a Layout,
    store: &'a dyn SnapshotStore,
    kernels: &'a KernelTracker,
}

impl<'a> RollbackEngine<'a> {
    pub fn new(
        layout: &'a Layout,
        store: &'a dyn SnapshotStore,
        kernels: &'a KernelTracker,
    ) -> Self {
        Self {
            layout,
            store,
            kernels,
        }
    }

    pub fn table(&self) -> Result<SnapshotTable> {
        table::build_table(&self.layout.snapshot_dir())
    }

    fn undo_buffer(&self) -> UndoBuffer {
        UndoBuffer::new(self.layout.undo_dir())
    }

    /// Resolve `timestamp` and check every requested subvolume is in it.
    /// An empty selection means the whole session.
    pub fn plan(
        &self,
        timestamp: &str,
        subvolumes: &[String],
    ) -> Result<(Timestamp, Vec<String>)> {
        let table = self.table()?;
        let session = table
            .find(timestamp)
            .ok_or_else(|| EngineError::SessionNotFound(timestamp.to_string()))?;

        if subvolumes.is_empty() {
            return Ok((session.timestamp.clone(), session.subvolumes.clone()));
        }

        for subvolume in subvolumes {
            if !session.contains(subvolume) {
                return Err(EngineError::SubvolumeNotInSession {
                    subvolume: subvolume.clone(),
                    timestamp: timestamp.to_string(),
                });
            }
        }

        let mut selected = subvolumes.to_vec();
        selected.sort();
        selected.dedup();
        Ok((session.timestamp.clone(), selected))
    }

    /// Roll back to the session at 1-indexed `index` of a fresh listing.
    pub fn rollback_session(&self, index: usize, subvolumes: &[String]) -> Result<RollbackReport> {
        let table = self.table()?;
        let timestamp = table.session(index)?.timestamp.as_str().to_string();
        self.rollback(&timestamp, subvolumes)
    }

    pub fn rollback(&self, timestamp: &str, subvolumes: &[String]) -> Result<RollbackReport> {
        let (timestamp, selected) = self.plan(timestamp, subvolumes)?;

        // The kernel goes first: a rollback the machine cannot boot is worse
        // than no rollback at all.
        let kernel = match self.kernels.read_marker(&timestamp)? {
            Some(version) => self.kernels.restore(&version)?,
            None => {
                tracing::warn!(
                    "No kernel marker for {} (snapshot predates kernel backups)",
                    timestamp
                );
                KernelRestore::Untracked
            }
        };

        let undo = self.undo_buffer();
        let stale_undo = undo.clear(self.store)?;

        let mut journal = Journal::start(&self.layout.journal(), Operation::Rollback)?;
        let mut restored = Vec::with_capacity(selected.len());
        for subvolume in &selected {
            self.swap_in(&mut journal, &undo, subvolume, &timestamp)?;
            restored.push(subvolume.clone());
        }

        system::sync_storage();
        tracing::info!("Rollback to {} complete, previous state is in old/", timestamp);

        Ok(RollbackReport {
            timestamp: timestamp.as_str().to_string(),
            kernel,
            restored,
            stale_undo,
        })
    }

    fn swap_in(
        &self,
        journal: &mut Journal,
        undo: &UndoBuffer,
        subvolume: &str,
        timestamp: &Timestamp,
    ) -> Result<()> {
        let live = self.layout.live_path(subvolume);
        let held = undo.path_for(subvolume);
        let snapshot = self.layout.snapshot_path(subvolume, timestamp);

        journal.record(subvolume, Step::MoveLiveToUndo, &live, &held)?;
        rename(subvolume, SubvolumeState::Live, &live, &held)?;

        journal.record(subvolume, Step::RestoreFromSnapshot, &snapshot, &live)?;
        self.store
            .snapshot(&snapshot, &live, false)
            .map_err(|e| EngineError::SwapInterrupted {
                subvolume: subvolume.to_string(),
                state: SubvolumeState::UndoHeld,
                reason: e.to_string(),
            })?;

        tracing::info!("{} -> {}", subvolume, timestamp);
        Ok(())
    }

    /// Swap every undo-held subvolume back into place. Kernel backups and
    /// the boot directory are left as the rollback set them.
    pub fn revert(&self) -> Result<RevertReport> {
        let undo = self.undo_buffer();
        let held = undo.held(self.store)?;
        if held.is_empty() {
            return Err(EngineError::NothingToRevert);
        }

        let mut journal = Journal::start(&self.layout.journal(), Operation::Revert)?;
        let mut reverted = Vec::with_capacity(held.len());
        for subvolume in &held {
            self.rotate(&mut journal, &undo, subvolume)?;
            reverted.push(subvolume.clone());
        }

        system::sync_storage();
        Ok(RevertReport { reverted })
    }

    fn rotate(&self, journal: &mut Journal, undo: &UndoBuffer, subvolume: &str) -> Result<()> {
        let live = self.layout.live_path(subvolume);
        let held = undo.path_for(subvolume);
        let temp = self.layout.revert_temp_path(subvolume);

        journal.record(subvolume, Step::MoveLiveToTemp, &live, &temp)?;
        rename(subvolume, SubvolumeState::Live, &live, &temp)?;

        journal.record(subvolume, Step::MoveUndoToLive, &held, &live)?;
        rename(subvolume, SubvolumeState::Detached, &held, &live)?;

        journal.record(subvolume, Step::MoveTempToUndo, &temp, &held)?;
        rename(subvolume, SubvolumeState::Detached, &temp, &held)?;

        tracing::info!("Reverted {}", subvolume);
        Ok(())
    }
}

/// `state` is where the live instance is if this rename fails.
fn rename(subvolume: &str, state: SubvolumeState, from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| EngineError::SwapInterrupted {
        subvolume: subvolume.to_string(),
        state,
        reason: format!("rename {} -> {}: {}", from.display(), to.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DirStore, Fixture, RecordingLoader, read_content, write_subvolume};

    const STAMP: &str = "20240101T120000";

    fn tracker(fixture: &Fixture, loader: RecordingLoader) -> KernelTracker {
        KernelTracker::new(
            fixture.layout.clone(),
            fixture.boot.clone(),
            Box::new(loader),
        )
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn rollback_then_revert_round_trip() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let report = engine.rollback(STAMP, &names(&["root"])).expect("rollback");

        assert_eq!(report.kernel, KernelRestore::Untracked);
        assert_eq!(report.restored, names(&["root"]));
        assert_eq!(read_content(&fixture.layout.live_path("root")), "Y");
        assert_eq!(read_content(&fixture.layout.undo_path("root")), "X");
        let ts = Timestamp::parse(STAMP).expect("valid");
        assert_eq!(read_content(&fixture.layout.snapshot_path("root", &ts)), "Y");

        let reverted = engine.revert().expect("revert");

        assert_eq!(reverted.reverted, names(&["root"]));
        assert_eq!(read_content(&fixture.layout.live_path("root")), "X");
        assert_eq!(read_content(&fixture.layout.undo_path("root")), "Y");
        assert!(!fixture.layout.revert_temp_path("root").exists());

        engine.revert().expect("revert the revert");
        assert_eq!(read_content(&fixture.layout.live_path("root")), "Y");
        assert_eq!(read_content(&fixture.layout.undo_path("root")), "X");
    }

    #[test]
    fn empty_selection_rolls_back_whole_session() {
        let fixture = Fixture::new();
        fixture.write_live("root", "live-root");
        fixture.write_live("home", "live-home");
        fixture.write_snapshot("root", STAMP, "old-root");
        fixture.write_snapshot("home", STAMP, "old-home");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let report = engine.rollback_session(1, &[]).expect("rollback");

        assert_eq!(report.restored, names(&["home", "root"]));
        assert_eq!(read_content(&fixture.layout.live_path("home")), "old-home");
        assert_eq!(read_content(&fixture.layout.live_path("root")), "old-root");
    }

    #[test]
    fn empty_table_is_out_of_range() {
        let fixture = Fixture::new();
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        for index in [0, 1, 7] {
            let err = engine.rollback_session(index, &[]).expect_err("out of range");
            assert!(matches!(err, EngineError::SessionOutOfRange { len: 0, .. }));
        }
    }

    #[test]
    fn unknown_subvolume_is_rejected_before_any_change() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let err = engine
            .rollback(STAMP, &names(&["root", "var"]))
            .expect_err("var not captured");

        assert!(matches!(
            err,
            EngineError::SubvolumeNotInSession { ref subvolume, .. } if subvolume == "var"
        ));
        assert_eq!(read_content(&fixture.layout.live_path("root")), "X");
        assert!(!fixture.layout.undo_dir().exists());
    }

    #[test]
    fn missing_kernel_backup_aborts_before_touching_subvolumes() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        write_subvolume(&fixture.layout.undo_path("home"), "previous undo");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let ts = Timestamp::parse(STAMP).expect("valid");
        kernels.write_marker(&ts, "6.1.0").expect("marker");
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let err = engine.rollback(STAMP, &[]).expect_err("no backup");

        assert!(matches!(err, EngineError::KernelBackupMissing(ref v) if v == "6.1.0"));
        assert_eq!(read_content(&fixture.layout.live_path("root")), "X");
        assert_eq!(
            read_content(&fixture.layout.undo_path("home")),
            "previous undo"
        );
    }

    #[test]
    fn boot_loader_failure_aborts_rollback() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        fixture.write_boot_kernel("6.8.0", "k");
        let store = DirStore::default();
        let loader = RecordingLoader {
            fail: true,
            ..RecordingLoader::default()
        };
        let kernels = tracker(&fixture, loader);
        kernels.backup("6.8.0").expect("backup");
        let ts = Timestamp::parse(STAMP).expect("valid");
        kernels.write_marker(&ts, "6.8.0").expect("marker");
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let err = engine.rollback(STAMP, &[]).expect_err("grubby failed");

        assert!(matches!(err, EngineError::BootLoader(_)));
        assert_eq!(read_content(&fixture.layout.live_path("root")), "X");
    }

    #[test]
    fn tracked_session_restores_its_kernel() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        fixture.write_boot_kernel("6.1.0", "k");
        let store = DirStore::default();
        let loader = RecordingLoader::default();
        let kernels = tracker(&fixture, loader.clone());
        kernels.backup("6.1.0").expect("backup");
        fs::remove_file(fixture.boot.kernel_image("6.1.0")).expect("package removed kernel");
        let ts = Timestamp::parse(STAMP).expect("valid");
        kernels.write_marker(&ts, "6.1.0").expect("marker");
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let report = engine.rollback(STAMP, &[]).expect("rollback");

        assert_eq!(report.kernel, KernelRestore::Placed("6.1.0".to_string()));
        assert!(fixture.boot.kernel_image("6.1.0").exists());
        assert_eq!(
            loader.defaults.borrow().as_slice(),
            &[fixture.boot.kernel_image("6.1.0")]
        );
    }

    #[test]
    fn new_rollback_replaces_undo_contents() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_live("home", "H");
        fixture.write_snapshot("root", STAMP, "Y");
        fixture.write_snapshot("home", STAMP, "G");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        engine.rollback(STAMP, &names(&["home"])).expect("first rollback");
        assert!(fixture.layout.undo_path("home").exists());

        engine.rollback(STAMP, &names(&["root"])).expect("second rollback");

        let held = UndoBuffer::new(fixture.layout.undo_dir())
            .held(&store)
            .expect("held");
        assert_eq!(held, names(&["root"]));
        assert_eq!(read_content(&fixture.layout.undo_path("root")), "X");
    }

    #[test]
    fn revert_with_empty_buffer_fails() {
        let fixture = Fixture::new();
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        assert!(matches!(engine.revert(), Err(EngineError::NothingToRevert)));

        fs::create_dir_all(fixture.layout.undo_dir()).expect("empty buffer");
        assert!(matches!(engine.revert(), Err(EngineError::NothingToRevert)));
    }

    #[test]
    fn journal_records_each_step() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        let store = DirStore::default();
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        engine.rollback(STAMP, &[]).expect("rollback");
        let steps: Vec<Step> = Journal::read(&fixture.layout.journal())
            .expect("journal")
            .into_iter()
            .map(|record| record.step)
            .collect();
        assert_eq!(steps, vec![Step::MoveLiveToUndo, Step::RestoreFromSnapshot]);

        engine.revert().expect("revert");
        let steps: Vec<Step> = Journal::read(&fixture.layout.journal())
            .expect("journal")
            .into_iter()
            .map(|record| record.step)
            .collect();
        assert_eq!(
            steps,
            vec![Step::MoveLiveToTemp, Step::MoveUndoToLive, Step::MoveTempToUndo]
        );
    }

    #[test]
    fn failed_snapshot_reports_undo_held_state() {
        let fixture = Fixture::new();
        fixture.write_live("root", "X");
        fixture.write_snapshot("root", STAMP, "Y");
        let store = DirStore::failing_snapshot(["root"]);
        let kernels = tracker(&fixture, RecordingLoader::default());
        let engine = RollbackEngine::new(&fixture.layout, &store, &kernels);

        let err = engine.rollback(STAMP, &[]).expect_err("snapshot refused");

        assert!(matches!(
            err,
            EngineError::SwapInterrupted {
                state: SubvolumeState::UndoHeld,
                ..
            }
        ));
        assert!(!fixture.layout.live_path("root").exists());
        assert_eq!(read_content(&fixture.layout.undo_path("root")), "X");
    }
}
