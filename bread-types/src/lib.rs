// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for bread snapshot management
//!
//! These models are shared by the engine and every front-end that renders
//! its results:
//!
//! - **bread-btrfs**: returns `SubvolumeEntry` values from subvolume discovery
//! - **bread-engine**: produces sessions, cycle statistics and rollback reports
//! - **bread-cli**: prints them as tables or serializes them as JSON
//!
//! Nothing in here is authoritative state. The snapshot directory on disk is
//! the source of truth and these values are point-in-time copies of it.

pub mod btrfs;
pub mod retention;
pub mod rollback;
pub mod snapshot;

pub use btrfs::{SubvolumeEntry, SubvolumeList};
pub use retention::RetentionConfig;
pub use rollback::{KernelRestore, PurgeReport, RevertReport, RollbackReport};
pub use snapshot::{CycleStats, SnapshotSession};
