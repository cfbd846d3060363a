//! Database operations for `users`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    /// Normalized handle: lowercase, no leading `@`.
    pub handle: String,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_analysis_at: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "id, handle, external_id, created_at, last_analysis_at";

/// Inserts a user, or returns the existing row for `handle`.
///
/// A conflicting row keeps its external id unless it had none.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_user(
    pool: &PgPool,
    handle: &str,
    external_id: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (handle, external_id) VALUES ($1, $2) \
         ON CONFLICT (handle) DO UPDATE SET \
             external_id = COALESCE(users.external_id, EXCLUDED.external_id) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(handle)
    .bind(external_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_handle(pool: &PgPool, handle: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE handle = $1"
    ))
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// All users, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Records when the user's last analysis completed.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn touch_last_analysis(
    pool: &PgPool,
    id: i64,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE users SET last_analysis_at = $1 WHERE id = $2")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
