// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot entry and kernel marker naming
//!
//! Entries are named `<subvolume>.<timestamp>` and kernel markers
//! `.kernel.<timestamp>`. Timestamps come in two grains, `YYYYMMDDTHHMMSS`
//! and the older `YYYYMMDDTHHMM`. Names that do not decode are not errors;
//! callers skip them so unrelated files never break a listing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Local, NaiveDateTime, Timelike};

pub const KERNEL_MARKER_PREFIX: &str = ".kernel.";

const SECOND_FORMAT: &str = "%Y%m%dT%H%M%S";
const SECOND_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";
const MINUTE_DISPLAY: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grain {
    Second,
    Minute,
}

/// A session timestamp as it appears in entry names.
///
/// Ordering and equality follow the raw string, which sorts chronologically
/// for timestamps of the same grain.
#[derive(Debug, Clone)]
pub struct Timestamp {
    raw: String,
    instant: NaiveDateTime,
    grain: Grain,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = raw.as_bytes();
        let grain = match bytes.len() {
            15 => Grain::Second,
            13 => Grain::Minute,
            _ => return None,
        };
        let shape_ok = bytes.iter().enumerate().all(|(idx, byte)| {
            if idx == 8 {
                *byte == b'T'
            } else {
                byte.is_ascii_digit()
            }
        });
        if !shape_ok {
            return None;
        }

        let padded = match grain {
            Grain::Second => raw.to_string(),
            Grain::Minute => format!("{raw}00"),
        };
        let instant = NaiveDateTime::parse_from_str(&padded, SECOND_FORMAT).ok()?;

        Some(Self {
            raw: raw.to_string(),
            instant,
            grain,
        })
    }

    pub fn from_datetime(instant: NaiveDateTime) -> Self {
        Self {
            raw: instant.format(SECOND_FORMAT).to_string(),
            instant,
            grain: Grain::Second,
        }
    }

    /// Local wall-clock time, second grain
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self::from_datetime(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }

    pub fn grain(&self) -> Grain {
        self.grain
    }

    /// `2024-01-01 12:00:00`, or without seconds for minute-grain stamps
    pub fn display(&self) -> String {
        let format = match self.grain {
            Grain::Second => SECOND_DISPLAY,
            Grain::Minute => MINUTE_DISPLAY,
        };
        self.instant.format(format).to_string()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Timestamp {}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Human-readable form of a raw timestamp; unparsable input comes back as is.
pub fn format_human(raw: &str) -> String {
    Timestamp::parse(raw)
        .map(|ts| ts.display())
        .unwrap_or_else(|| raw.to_string())
}

/// A decoded `<subvolume>.<timestamp>` entry name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryName {
    pub subvolume: String,
    pub timestamp: Timestamp,
}

pub fn encode_entry(subvolume: &str, timestamp: &Timestamp) -> String {
    format!("{subvolume}.{timestamp}")
}

/// Split on the last `.`; hidden files never decode.
pub fn decode_entry(name: &str) -> Option<EntryName> {
    if name.starts_with('.') {
        return None;
    }
    let (subvolume, raw) = name.rsplit_once('.')?;
    if subvolume.is_empty() {
        return None;
    }
    let timestamp = Timestamp::parse(raw)?;

    Some(EntryName {
        subvolume: subvolume.to_string(),
        timestamp,
    })
}

pub fn encode_marker(timestamp: &Timestamp) -> String {
    format!("{KERNEL_MARKER_PREFIX}{timestamp}")
}

pub fn decode_marker(name: &str) -> Option<Timestamp> {
    name.strip_prefix(KERNEL_MARKER_PREFIX)
        .and_then(Timestamp::parse)
}
