// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use bread_btrfs::BtrfsError;
use thiserror::Error;

use crate::undo::SubvolumeState;

/// Error types for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No configuration found at {}. Run 'bread config' first.", .0.display())]
    ConfigMissing(PathBuf),

    #[error("Invalid configuration at {}: {source}", .path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fstab mounts btrfs by subvolid, boot will fail after rollback: {}", .0.join("; "))]
    UnsafeBootConfig(Vec<String>),

    #[error("Kernel {0} backup not found. Cannot safely roll back.")]
    KernelBackupMissing(String),

    #[error("Nothing to revert: undo buffer is empty")]
    NothingToRevert,

    #[error("Invalid snapshot number {index}. Range: 1-{len}")]
    SessionOutOfRange { index: usize, len: usize },

    #[error("No snapshot session at {0}")]
    SessionNotFound(String),

    #[error("Subvolume '{subvolume}' not in snapshot {timestamp}")]
    SubvolumeNotInSession {
        subvolume: String,
        timestamp: String,
    },

    #[error("Swap of '{subvolume}' stopped with it {state}: {reason}")]
    SwapInterrupted {
        subvolume: String,
        state: SubvolumeState,
        reason: String,
    },

    #[error("Boot loader error: {0}")]
    BootLoader(String),

    #[error("Root required")]
    NotRoot,

    #[error("Root filesystem is not btrfs: {0}")]
    NotBtrfsRoot(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("BTRFS error: {0}")]
    Btrfs(#[from] BtrfsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
