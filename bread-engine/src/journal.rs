// SPDX-License-Identifier: GPL-3.0-only

//! Recovery journal for rollback and revert
//!
//! Every per-subvolume rename or snapshot is appended here before it runs,
//! so a crash mid-swap leaves a record of exactly which step was in flight.
//! Nothing replays it; it exists for manual diagnosis.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Rollback,
    Revert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    MoveLiveToUndo,
    RestoreFromSnapshot,
    MoveLiveToTemp,
    MoveUndoToLive,
    MoveTempToUndo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub time: DateTime<Utc>,
    pub operation: Operation,
    pub subvolume: String,
    pub step: Step,
    pub from: PathBuf,
    pub to: PathBuf,
}

pub struct Journal {
    operation: Operation,
    file: File,
}

impl Journal {
    /// Truncate the journal at `path` and start recording `operation`.
    pub fn start(path: &Path, operation: Operation) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { operation, file })
    }

    pub fn record(&mut self, subvolume: &str, step: Step, from: &Path, to: &Path) -> Result<()> {
        let record = JournalRecord {
            time: Utc::now(),
            operation: self.operation,
            subvolume: subvolume.to_string(),
            step,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Records in the journal at `path`; unreadable lines are skipped.
    pub fn read(path: &Path) -> Result<Vec<JournalRecord>> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable journal line: {}", e),
            }
        }
        Ok(records)
    }
}
