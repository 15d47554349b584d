// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot lifecycle and rollback engine
//!
//! This crate owns the bookkeeping layered on top of the copy-on-write
//! primitive in `bread-btrfs`:
//! - Naming convention for snapshot entries and kernel markers
//! - Snapshot table built from the snapshot directory listing
//! - Bucketed retention and pruning
//! - Kernel backup tracking and restore
//! - Rollback/revert through the single-slot undo buffer
//! - fstab safety check before any rollback
//!
//! The filesystem is the only source of truth. Every operation rebuilds what
//! it needs from directory contents; nothing is cached between calls.
//! Callers must serialize invocations; there is no locking.

pub mod config;
pub mod cycle;
pub mod error;
pub mod journal;
pub mod kernel;
pub mod layout;
pub mod naming;
pub mod purge;
pub mod retention;
pub mod rollback;
pub mod safety;
pub mod system;
pub mod table;
pub mod undo;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CONFIG_FILE, Config};
pub use cycle::SnapshotCycle;
pub use error::{EngineError, Result};
pub use journal::{Journal, JournalRecord, Operation, Step};
pub use kernel::{BootLoader, Grubby, KernelTracker};
pub use layout::{BootLayout, Layout, RESERVED_NAMES};
pub use naming::{EntryName, Timestamp};
pub use purge::purge;
pub use retention::{PrunePlan, plan_prune, prune_subvolume};
pub use rollback::RollbackEngine;
pub use safety::SafetyGuard;
pub use table::{Session, SnapshotTable, build_table};
pub use undo::{SubvolumeState, UndoBuffer};
