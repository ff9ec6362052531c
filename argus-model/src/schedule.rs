//! Weekly activation windows for cameras.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One row of `cctv_scheduler`.
///
/// `day_of_week` uses the schema's encoding: 0 = Sunday … 6 = Saturday.
/// Windows that cross midnight are stored pre-split into two rows
/// (`start..24:00` on day d, `00:00..end` on day (d+1) % 7), so a single
/// row never wraps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub cctv_id: i32,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl ScheduleWindow {
    /// Whether `time` on `day` (schema encoding) falls inside this window.
    pub fn contains(&self, day: i16, time: NaiveTime) -> bool {
        self.is_active
            && self.day_of_week == day
            && self.start_time <= time
            && time <= self.end_time
    }
}
