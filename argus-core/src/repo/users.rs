//! `users` and `user_cctv_map` queries.

use sqlx::PgPool;

use crate::error::Result;
use argus_model::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    full_name: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            full_name: r.full_name,
            email: r.email,
        }
    }
}

/// Users responsible for a camera, in mapping order.
pub async fn recipients_for_camera(pool: &PgPool, cctv_id: i32) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.full_name, u.email
        FROM user_cctv_map ucm
        JOIN users u ON ucm.user_id = u.id
        WHERE ucm.cctv_id = $1
        ORDER BY u.id
        "#,
    )
    .bind(cctv_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Every user together with the camera ids they own. Users with no
/// mappings are omitted; they receive no recaps.
pub async fn users_with_cameras(pool: &PgPool) -> Result<Vec<(User, Vec<i32>)>> {
    #[derive(Debug, sqlx::FromRow)]
    struct MappedRow {
        id: i32,
        username: String,
        full_name: String,
        email: String,
        cctv_id: i32,
    }

    let rows: Vec<MappedRow> = sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.full_name, u.email, ucm.cctv_id
        FROM users u
        JOIN user_cctv_map ucm ON ucm.user_id = u.id
        ORDER BY u.id, ucm.cctv_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut grouped: Vec<(User, Vec<i32>)> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some((user, cameras)) if user.id == row.id => cameras.push(row.cctv_id),
            _ => grouped.push((
                User {
                    id: row.id,
                    username: row.username,
                    full_name: row.full_name,
                    email: row.email,
                },
                vec![row.cctv_id],
            )),
        }
    }
    Ok(grouped)
}
