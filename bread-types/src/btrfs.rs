// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// One row of `btrfs subvolume list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeEntry {
    pub id: u64,
    pub generation: u64,
    pub top_level: u64,
    pub path: String,
}

impl SubvolumeEntry {
    /// Direct child of the filesystem tree root (subvolid 5).
    pub fn is_top_level(&self) -> bool {
        self.top_level == 5 && !self.path.contains('/')
    }
}

/// Subvolumes of a mounted filesystem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubvolumeList {
    pub subvolumes: Vec<SubvolumeEntry>,
}

impl SubvolumeList {
    /// Names of the top-level subvolumes, minus `reserved`, sorted.
    pub fn live_names(&self, reserved: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = self
            .subvolumes
            .iter()
            .filter(|entry| entry.is_top_level())
            .filter(|entry| !reserved.contains(&entry.path.as_str()))
            .map(|entry| entry.path.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
