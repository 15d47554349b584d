// SPDX-License-Identifier: GPL-3.0-only

//! Bucketed retention
//!
//! The newest snapshot always survives. On top of that, each granularity
//! walks the history newest-first and keeps the first snapshot it meets in
//! each distinct bucket until its count runs out. The kept set is the union
//! of all four passes, so one snapshot can satisfy several granularities.

use std::collections::HashSet;
use std::hash::Hash;

use bread_btrfs::SnapshotStore;
use bread_types::{CycleStats, RetentionConfig};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::Result;
use crate::layout::Layout;
use crate::table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    Hour(i32, u32, u32, u32),
    Day(i32, u32, u32),
    Week(i32, u32),
    Month(i32, u32),
}

#[derive(Debug, Clone, Copy)]
enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    const ALL: [Granularity; 4] = [
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    fn count(self, config: &RetentionConfig) -> usize {
        let count = match self {
            Granularity::Hourly => config.hourly,
            Granularity::Daily => config.daily,
            Granularity::Weekly => config.weekly,
            Granularity::Monthly => config.monthly,
        };
        count as usize
    }

    fn bucket(self, instant: NaiveDateTime) -> Bucket {
        match self {
            Granularity::Hourly => Bucket::Hour(
                instant.year(),
                instant.month(),
                instant.day(),
                instant.hour(),
            ),
            Granularity::Daily => Bucket::Day(instant.year(), instant.month(), instant.day()),
            Granularity::Weekly => {
                let week = instant.iso_week();
                Bucket::Week(week.year(), week.week())
            }
            Granularity::Monthly => Bucket::Month(instant.year(), instant.month()),
        }
    }
}

/// Ids to keep from a newest-first history.
pub fn select_keep<K>(history: &[(NaiveDateTime, K)], config: &RetentionConfig) -> HashSet<K>
where
    K: Clone + Eq + Hash,
{
    let mut keep = HashSet::new();
    if let Some((_, newest)) = history.first() {
        keep.insert(newest.clone());
    }

    for granularity in Granularity::ALL {
        let count = granularity.count(config);
        let mut seen = HashSet::new();
        for (instant, id) in history {
            if seen.len() >= count {
                break;
            }
            if seen.insert(granularity.bucket(*instant)) {
                keep.insert(id.clone());
            }
        }
    }

    keep
}

/// Outcome of a retention pass, both halves in history order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunePlan<K> {
    pub keep: Vec<K>,
    pub evict: Vec<K>,
}

pub fn plan_prune<K>(history: &[(NaiveDateTime, K)], config: &RetentionConfig) -> PrunePlan<K>
where
    K: Clone + Eq + Hash,
{
    let keep_set = select_keep(history, config);
    let (keep, evict): (Vec<_>, Vec<_>) = history
        .iter()
        .map(|(_, id)| id.clone())
        .partition(|id| keep_set.contains(id));

    PrunePlan { keep, evict }
}

/// Apply retention to one subvolume's snapshots. Delete failures are
/// counted and the pass carries on.
pub fn prune_subvolume(
    store: &dyn SnapshotStore,
    layout: &Layout,
    subvolume: &str,
    config: &RetentionConfig,
) -> Result<CycleStats> {
    let table = table::build_table(&layout.snapshot_dir())?;
    let history: Vec<_> = table
        .history(subvolume)
        .into_iter()
        .map(|timestamp| (timestamp.instant(), timestamp))
        .collect();

    let plan = plan_prune(&history, config);
    let mut stats = CycleStats::default();

    for timestamp in plan.evict {
        let path = layout.snapshot_path(subvolume, &timestamp);
        tracing::info!("Pruning {}", path.display());
        match store.delete(&path) {
            Ok(()) => stats.pruned += 1,
            Err(e) => {
                tracing::warn!("Failed to prune {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}
