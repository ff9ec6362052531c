//! `cctv_data` and `cctv_violation_config` queries.

use std::collections::{HashMap, HashSet};

use sqlx::PgPool;

use crate::error::Result;

/// Raw enabled-camera row; the ROI column is fetched as text so that both
/// storage shapes (inline JSON document, storage-object filename) come
/// through one code path.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CameraRow {
    pub id: i32,
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub token: String,
    pub location: Option<String>,
    pub area: Option<String>,
    pub enabled: bool,
}

pub async fn fetch_enabled(pool: &PgPool) -> Result<Vec<CameraRow>> {
    let rows: Vec<CameraRow> = sqlx::query_as(
        r#"
        SELECT id, name, ip_address, port::int4 AS port, token, location,
               area::text AS area, enabled
        FROM cctv_data
        WHERE enabled = TRUE
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Active violation class ids keyed by camera.
pub async fn fetch_active_violations(pool: &PgPool) -> Result<HashMap<i32, HashSet<i32>>> {
    let rows: Vec<(i32, i32)> = sqlx::query_as(
        r#"
        SELECT cvc.cctv_id, cvc.class_id
        FROM cctv_violation_config cvc
        JOIN object_class oc ON oc.id = cvc.class_id
        WHERE cvc.is_active = TRUE
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut active: HashMap<i32, HashSet<i32>> = HashMap::new();
    for (cctv_id, class_id) in rows {
        active.entry(cctv_id).or_default().insert(class_id);
    }
    Ok(active)
}
