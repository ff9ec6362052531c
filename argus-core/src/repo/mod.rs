//! Database access layer.
//!
//! Plain functions over a shared [`sqlx::PgPool`]; every call acquires a
//! connection for the duration of one statement. Nothing in the hot path
//! opens a transaction.

pub mod cameras;
pub mod classes;
pub mod schedules;
pub mod settings;
pub mod templates;
pub mod users;
pub mod violations;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::Result;

/// Connect to PostgreSQL with pool limits suited to many short-lived
/// acquisitions from workers and schedulers.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
