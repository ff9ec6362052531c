//! `violation_detection` and `violation_daily_log` queries.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::Result;
use argus_model::{DailyRollup, ViolationEvent};

/// A violation joined with its camera and class, as needed by
/// notifications and reports.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ViolationDetail {
    pub id: i64,
    pub cctv_id: i32,
    pub cctv_name: String,
    pub location: Option<String>,
    pub violation_name: String,
    pub image_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Insert one event row; returns the stored record.
pub async fn insert_event(
    pool: &PgPool,
    cctv_id: i32,
    class_id: i32,
    image_url: &str,
    timestamp: DateTime<FixedOffset>,
) -> Result<ViolationEvent> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO violation_detection (id_cctv, id_violation, image, timestamp)
        VALUES ($1, $2, $3, $4)
        RETURNING id::int8
        "#,
    )
    .bind(cctv_id)
    .bind(class_id)
    .bind(image_url)
    .bind(timestamp)
    .fetch_one(pool)
    .await?;

    Ok(ViolationEvent {
        id,
        cctv_id,
        class_id,
        image_url: image_url.to_owned(),
        timestamp: timestamp.with_timezone(&Utc),
    })
}

/// Materialized counters for one day, as the dashboard reads them.
pub async fn fetch_rollups_for_date(pool: &PgPool, log_date: NaiveDate) -> Result<Vec<DailyRollup>> {
    let rows: Vec<(NaiveDate, i32, i32, i64, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT log_date, id_cctv, id_violation,
               total_violation::int8, latest_update
        FROM violation_daily_log
        WHERE log_date = $1
        ORDER BY id_cctv, id_violation
        "#,
    )
    .bind(log_date)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(log_date, cctv_id, class_id, total_violation, latest_update)| DailyRollup {
            log_date,
            cctv_id,
            class_id,
            total_violation,
            latest_update,
        })
        .collect())
}

/// Bump the per-day counter for one fresh event.
pub async fn increment_daily_rollup(
    pool: &PgPool,
    log_date: NaiveDate,
    cctv_id: i32,
    class_id: i32,
    now: DateTime<FixedOffset>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO violation_daily_log
            (log_date, id_cctv, id_violation, total_violation, latest_update)
        VALUES ($1, $2, $3, 1, $4)
        ON CONFLICT (log_date, id_cctv, id_violation)
        DO UPDATE SET
            total_violation = violation_daily_log.total_violation + 1,
            latest_update = EXCLUDED.latest_update
        "#,
    )
    .bind(log_date)
    .bind(cctv_id)
    .bind(class_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recompute the rollup for one local day from the raw events.
///
/// Idempotent: counters are *set* to the aggregate, never added, and
/// `latest_update` moves only when the count actually changed, so replaying
/// the hourly job is safe.
pub async fn materialize_daily_rollup(
    pool: &PgPool,
    log_date: NaiveDate,
    day_start: DateTime<FixedOffset>,
    day_end: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO violation_daily_log
            (log_date, id_cctv, id_violation, total_violation, latest_update)
        SELECT $1, vd.id_cctv, vd.id_violation, COUNT(*), $4
        FROM violation_detection vd
        WHERE vd.timestamp >= $2 AND vd.timestamp < $3
        GROUP BY vd.id_cctv, vd.id_violation
        ON CONFLICT (log_date, id_cctv, id_violation)
        DO UPDATE SET
            total_violation = EXCLUDED.total_violation,
            latest_update = EXCLUDED.latest_update
        WHERE violation_daily_log.total_violation IS DISTINCT FROM EXCLUDED.total_violation
        "#,
    )
    .bind(log_date)
    .bind(day_start)
    .bind(day_end)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// One joined event by id.
pub async fn fetch_detail(pool: &PgPool, violation_id: i64) -> Result<Option<ViolationDetail>> {
    let row = sqlx::query_as(
        r#"
        SELECT vd.id::int8 AS id, cd.id AS cctv_id, cd.name AS cctv_name,
               cd.location, oc.name AS violation_name,
               vd.image AS image_url, vd.timestamp
        FROM violation_detection vd
        JOIN cctv_data cd ON vd.id_cctv = cd.id
        JOIN object_class oc ON vd.id_violation = oc.id
        WHERE vd.id = $1
        "#,
    )
    .bind(violation_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Joined events on the given cameras in `[start, end)`, newest first.
pub async fn fetch_details_between(
    pool: &PgPool,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    camera_ids: &[i32],
) -> Result<Vec<ViolationDetail>> {
    let rows = sqlx::query_as(
        r#"
        SELECT vd.id::int8 AS id, cd.id AS cctv_id, cd.name AS cctv_name,
               cd.location, oc.name AS violation_name,
               vd.image AS image_url, vd.timestamp
        FROM violation_detection vd
        JOIN cctv_data cd ON vd.id_cctv = cd.id
        JOIN object_class oc ON vd.id_violation = oc.id
        WHERE vd.timestamp >= $1 AND vd.timestamp < $2
          AND vd.id_cctv = ANY($3)
        ORDER BY vd.timestamp DESC
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(camera_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A listing row for the report table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub id: i64,
    pub cctv_name: String,
    pub violation_name: String,
    pub image_url: String,
    pub timestamp: DateTime<Utc>,
}

/// One page of joined report rows plus the unpaged total, optionally
/// filtered by camera-name substring.
pub async fn fetch_report_rows(
    pool: &PgPool,
    search: Option<&str>,
    newest_first: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ReportRow>, i64)> {
    let pattern = search
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM violation_detection vd
        JOIN cctv_data cd ON vd.id_cctv = cd.id
        WHERE ($1::text IS NULL OR cd.name ILIKE $1)
        "#,
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let order = if newest_first { "DESC" } else { "ASC" };
    let rows: Vec<ReportRow> = sqlx::query_as(&format!(
        r#"
        SELECT vd.id::int8 AS id, cd.name AS cctv_name,
               oc.name AS violation_name, vd.image AS image_url, vd.timestamp
        FROM violation_detection vd
        JOIN cctv_data cd ON vd.id_cctv = cd.id
        JOIN object_class oc ON vd.id_violation = oc.id
        WHERE ($1::text IS NULL OR cd.name ILIKE $1)
        ORDER BY vd.timestamp {order}
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// `(id, image_url)` for an explicit id set.
pub async fn fetch_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<(i64, String)>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id::int8, image
        FROM violation_detection
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `(id, image_url)` of events older than the retention cutoff.
pub async fn fetch_expired(
    pool: &PgPool,
    cutoff: DateTime<FixedOffset>,
) -> Result<Vec<(i64, String)>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id::int8, image
        FROM violation_detection
        WHERE timestamp < $1
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete event rows by id. Evidence objects must be deleted *before*
/// calling this.
pub async fn delete_events(pool: &PgPool, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM violation_detection WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
