//! Schedule evaluation: which cameras should run full detection right now.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use sqlx::PgPool;
use tracing::error;

use crate::repo;
use argus_model::ScheduleWindow;

/// Snapshot of the camera ids currently inside an active window.
///
/// The fleet supervisor rebuilds this each minute tick; detection workers
/// read it on every frame without touching the database.
#[derive(Debug, Default)]
pub struct ActiveWindows {
    inner: RwLock<Arc<HashSet<i32>>>,
}

impl ActiveWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, ids: HashSet<i32>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(ids);
    }

    pub fn contains(&self, cctv_id: i32) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&cctv_id)
    }

    pub fn snapshot(&self) -> Arc<HashSet<i32>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Evaluates `cctv_scheduler` rows against the local schedule clock.
#[derive(Debug, Clone)]
pub struct ScheduleEvaluator {
    pool: PgPool,
    tz: FixedOffset,
}

impl ScheduleEvaluator {
    pub fn new(pool: PgPool, tz: FixedOffset) -> Self {
        Self { pool, tz }
    }

    /// Cameras with an active window containing the current local time.
    ///
    /// Fails closed: any database error reads as "no camera is scheduled",
    /// so detection never runs during unknown windows.
    pub async fn active_camera_ids_now(&self) -> HashSet<i32> {
        let now = Utc::now().with_timezone(&self.tz);
        match repo::schedules::fetch_active(&self.pool).await {
            Ok(windows) => active_at(&windows, now),
            Err(e) => {
                error!("Schedule lookup failed, treating all cameras as unscheduled: {e}");
                HashSet::new()
            }
        }
    }

    pub async fn camera_scheduled_now(&self, cctv_id: i32) -> bool {
        self.active_camera_ids_now().await.contains(&cctv_id)
    }
}

/// Pure window evaluation at one instant of the schedule clock.
///
/// Weekdays are mapped to the schema encoding (0 = Sunday) at this boundary
/// only. Midnight-crossing windows are stored pre-split, so each row is a
/// same-day interval.
pub fn active_at(windows: &[ScheduleWindow], now: DateTime<FixedOffset>) -> HashSet<i32> {
    let day = now.weekday().num_days_from_sunday() as i16;
    let time = now.time();
    windows
        .iter()
        .filter(|w| w.contains(day, time))
        .map(|w| w.cctv_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn window(cctv_id: i32, day: i16, start: &str, end: &str) -> ScheduleWindow {
        ScheduleWindow {
            cctv_id,
            day_of_week: day,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            is_active: true,
        }
    }

    #[test]
    fn weekday_maps_to_schema_encoding() {
        // 2025-06-02 is a Monday; schema Monday = 1.
        let monday_noon = wib().with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let windows = vec![window(1, 1, "08:00:00", "17:00:00")];
        assert_eq!(active_at(&windows, monday_noon), HashSet::from([1]));

        // 2025-06-01 is a Sunday; schema Sunday = 0.
        let sunday_noon = wib().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(active_at(&windows, sunday_noon).is_empty());
        let sunday_windows = vec![window(1, 0, "08:00:00", "17:00:00")];
        assert_eq!(active_at(&sunday_windows, sunday_noon), HashSet::from([1]));
    }

    #[test]
    fn outside_the_window_is_inactive() {
        let windows = vec![window(1, 1, "08:00:00", "17:00:00")];
        let monday_dawn = wib().with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap();
        assert!(active_at(&windows, monday_dawn).is_empty());
    }

    #[test]
    fn pre_split_overnight_window_covers_both_sides_of_midnight() {
        // 22:00..24:00 Monday and 00:00..06:00 Tuesday.
        let windows = vec![
            window(2, 1, "22:00:00", "23:59:59"),
            window(2, 2, "00:00:00", "06:00:00"),
        ];
        let monday_night = wib().with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap();
        let tuesday_early = wib().with_ymd_and_hms(2025, 6, 3, 2, 0, 0).unwrap();
        let tuesday_noon = wib().with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap();
        assert_eq!(active_at(&windows, monday_night), HashSet::from([2]));
        assert_eq!(active_at(&windows, tuesday_early), HashSet::from([2]));
        assert!(active_at(&windows, tuesday_noon).is_empty());
    }

    #[test]
    fn multiple_cameras_evaluate_independently() {
        let windows = vec![
            window(1, 1, "08:00:00", "17:00:00"),
            window(2, 1, "13:00:00", "18:00:00"),
        ];
        let monday_morning = wib().with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        assert_eq!(active_at(&windows, monday_morning), HashSet::from([1]));
        let monday_afternoon = wib().with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap();
        assert_eq!(
            active_at(&windows, monday_afternoon),
            HashSet::from([1, 2])
        );
    }
}
