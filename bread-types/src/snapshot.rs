// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// All subvolumes captured at one timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSession {
    /// 1-indexed position in the table it was listed from. Not persisted.
    pub index: usize,
    /// Raw timestamp as it appears in entry names, e.g. `20240101T120000`
    pub timestamp: String,
    /// Human-readable form of `timestamp`
    pub display: String,
    /// Member subvolume names, sorted and unique
    pub subvolumes: Vec<String>,
}

/// Terminal counts of one snapshot cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub created: usize,
    pub pruned: usize,
    pub errors: usize,
}

impl CycleStats {
    pub fn merge(&mut self, other: CycleStats) {
        self.created += other.created;
        self.pruned += other.pruned;
        self.errors += other.errors;
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created {} | Pruned {} | Errors {}",
            self.created, self.pruned, self.errors
        )
    }
}
