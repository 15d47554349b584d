// SPDX-License-Identifier: GPL-3.0-only

//! BTRFS snapshot store for bread
//!
//! This library wraps the copy-on-write primitives the engine builds on:
//! read-only and writable snapshots, subvolume deletion, and discovery of
//! the live top-level subvolumes of a mounted filesystem tree.

pub mod error;
pub mod store;
pub mod subvolume;

// Re-export commonly used types
pub use error::{BtrfsError, Result};
pub use store::SnapshotStore;
pub use subvolume::{SubvolumeManager, parse_subvolume_list};

// Re-export shared models
pub use bread_types::btrfs::*;
