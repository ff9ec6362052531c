//! `object_class` queries.

use sqlx::PgPool;

use crate::error::Result;
use argus_model::{ObjectClass, Rgb};

#[derive(Debug, sqlx::FromRow)]
struct ClassRow {
    id: i32,
    name: String,
    color_r: Option<i32>,
    color_g: Option<i32>,
    color_b: Option<i32>,
    is_violation: bool,
    pair_id: Option<i32>,
}

impl From<ClassRow> for ObjectClass {
    fn from(row: ClassRow) -> Self {
        let color = match (row.color_r, row.color_g, row.color_b) {
            (Some(r), Some(g), Some(b)) => Rgb::new(
                r.clamp(0, 255) as u8,
                g.clamp(0, 255) as u8,
                b.clamp(0, 255) as u8,
            ),
            _ => Rgb::WHITE,
        };
        ObjectClass {
            id: row.id,
            name: row.name,
            color,
            is_violation: row.is_violation,
            pair_id: row.pair_id,
        }
    }
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<ObjectClass>> {
    let rows: Vec<ClassRow> = sqlx::query_as(
        r#"
        SELECT id, name,
               color_r::int4 AS color_r,
               color_g::int4 AS color_g,
               color_b::int4 AS color_b,
               is_violation, pair_id
        FROM object_class
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
