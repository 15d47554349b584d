// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// What happened to the boot directory during a rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "version")]
pub enum KernelRestore {
    /// The session predates kernel tracking; boot directory untouched
    Untracked,
    /// Backed-up kernel copied into the boot directory and made default
    Placed(String),
    /// Kernel was already present (system-managed) and made default
    AlreadyPresent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub timestamp: String,
    pub kernel: KernelRestore,
    /// Subvolumes now live from the session
    pub restored: Vec<String>,
    /// Undo-buffer entries that could not be deleted before the swap
    pub stale_undo: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReport {
    pub reverted: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub deleted: usize,
    pub errors: usize,
}
