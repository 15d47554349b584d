// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot table built from the snapshot directory listing
//!
//! This is a plain `read_dir`: no privilege and no btrfs calls, so a status
//! display and a rollback see exactly the same table.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use bread_types::SnapshotSession;

use crate::error::{EngineError, Result};
use crate::naming::{self, Timestamp};

/// One timestamp and every subvolume captured at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub timestamp: Timestamp,
    /// Sorted, unique
    pub subvolumes: Vec<String>,
}

impl Session {
    pub fn contains(&self, subvolume: &str) -> bool {
        self.subvolumes
            .binary_search_by(|name| name.as_str().cmp(subvolume))
            .is_ok()
    }
}

/// Sessions oldest first. Positions are 1-indexed and only stable for the
/// listing they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotTable {
    sessions: Vec<Session>,
}

impl SnapshotTable {
    /// Group decodable names by timestamp; everything else is ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut grouped: BTreeMap<Timestamp, BTreeSet<String>> = BTreeMap::new();
        for name in names {
            if let Some(entry) = naming::decode_entry(name.as_ref()) {
                grouped
                    .entry(entry.timestamp)
                    .or_default()
                    .insert(entry.subvolume);
            }
        }

        let sessions = grouped
            .into_iter()
            .filter(|(_, subvolumes)| !subvolumes.is_empty())
            .map(|(timestamp, subvolumes)| Session {
                timestamp,
                subvolumes: subvolumes.into_iter().collect(),
            })
            .collect();

        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Session by 1-indexed position
    pub fn session(&self, index: usize) -> Result<&Session> {
        index
            .checked_sub(1)
            .and_then(|idx| self.sessions.get(idx))
            .ok_or(EngineError::SessionOutOfRange {
                index,
                len: self.sessions.len(),
            })
    }

    pub fn find(&self, timestamp: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| session.timestamp.as_str() == timestamp)
    }

    pub fn timestamps(&self) -> BTreeSet<String> {
        self.sessions
            .iter()
            .map(|session| session.timestamp.as_str().to_string())
            .collect()
    }

    /// Timestamps holding `subvolume`, newest first
    pub fn history(&self, subvolume: &str) -> Vec<Timestamp> {
        self.sessions
            .iter()
            .rev()
            .filter(|session| session.contains(subvolume))
            .map(|session| session.timestamp.clone())
            .collect()
    }

    /// Serializable view for front-ends
    pub fn to_sessions(&self) -> Vec<SnapshotSession> {
        self.sessions
            .iter()
            .enumerate()
            .map(|(idx, session)| SnapshotSession {
                index: idx + 1,
                timestamp: session.timestamp.as_str().to_string(),
                display: session.timestamp.display(),
                subvolumes: session.subvolumes.clone(),
            })
            .collect()
    }
}

/// List `snapshot_dir` and build the table. A missing directory is an empty
/// table.
pub fn build_table(snapshot_dir: &Path) -> Result<SnapshotTable> {
    let entries = match fs::read_dir(snapshot_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} does not exist, no snapshots", snapshot_dir.display());
            return Ok(SnapshotTable::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }

    Ok(SnapshotTable::from_names(names))
}
