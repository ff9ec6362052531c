//! `cctv_scheduler` queries.

use sqlx::PgPool;

use crate::error::Result;
use argus_model::ScheduleWindow;

#[derive(Debug, sqlx::FromRow)]
struct WindowRow {
    cctv_id: i32,
    day_of_week: i16,
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    is_active: bool,
}

/// All active schedule windows. Day/time filtering happens in the
/// evaluator so the clock and timezone stay in one place.
pub async fn fetch_active(pool: &PgPool) -> Result<Vec<ScheduleWindow>> {
    let rows: Vec<WindowRow> = sqlx::query_as(
        r#"
        SELECT cctv_id, day_of_week::int2 AS day_of_week,
               start_time, end_time, is_active
        FROM cctv_scheduler
        WHERE is_active = TRUE
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ScheduleWindow {
            cctv_id: r.cctv_id,
            day_of_week: r.day_of_week,
            start_time: r.start_time,
            end_time: r.end_time,
            is_active: r.is_active,
        })
        .collect())
}
