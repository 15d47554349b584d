// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// How many distinct buckets of each granularity survive a prune,
/// most recent first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub hourly: u32,
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl RetentionConfig {
    pub fn new(hourly: u32, daily: u32, weekly: u32, monthly: u32) -> Self {
        Self {
            hourly,
            daily,
            weekly,
            monthly,
        }
    }

    /// True when only the mandatory newest snapshot would be kept.
    pub fn is_empty(&self) -> bool {
        self.hourly == 0 && self.daily == 0 && self.weekly == 0 && self.monthly == 0
    }
}
