//! Recorded incidents and their daily rollups.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One recorded violation, as stored in `violation_detection`.
///
/// Rows are insert-only; administrators may batch-delete them (evidence
/// object first, database row second).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub id: i64,
    pub cctv_id: i32,
    pub class_id: i32,
    pub image_url: String,
    pub timestamp: DateTime<Utc>,
}

/// One materialized per-day counter from `violation_daily_log`,
/// unique by `(log_date, cctv_id, class_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRollup {
    pub log_date: NaiveDate,
    pub cctv_id: i32,
    pub class_id: i32,
    pub total_violation: i64,
    pub latest_update: DateTime<Utc>,
}
