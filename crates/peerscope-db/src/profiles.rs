//! Database operations for `profiles`.
//!
//! Rows are never updated: a refresh inserts a new row and the newest
//! unexpired one wins.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
    pub handle: String,
    pub followers: i64,
    pub following: i64,
    pub post_count: i64,
    pub follower_following_ratio: f64,
    /// The AI-derived profile, including unknown fields.
    pub derived: Value,
    pub niche: String,
    pub posts_analyzed: i32,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Insert payload for [`insert_profile`].
#[derive(Debug, Clone)]
pub struct NewProfile<'a> {
    pub user_id: i64,
    pub handle: &'a str,
    pub followers: i64,
    pub following: i64,
    pub post_count: i64,
    pub follower_following_ratio: f64,
    pub derived: &'a Value,
    pub niche: &'a str,
    pub posts_analyzed: i32,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

const PROFILE_COLUMNS: &str = "id, user_id, handle, followers, following, post_count, \
     follower_following_ratio, derived, niche, posts_analyzed, fetched_at, expires_at";

/// Inserts a profile row and returns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_profile(pool: &PgPool, profile: &NewProfile<'_>) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "INSERT INTO profiles \
             (user_id, handle, followers, following, post_count, follower_following_ratio, \
              derived, niche, posts_analyzed, fetched_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(profile.user_id)
    .bind(profile.handle)
    .bind(profile.followers)
    .bind(profile.following)
    .bind(profile.post_count)
    .bind(profile.follower_following_ratio)
    .bind(profile.derived)
    .bind(profile.niche)
    .bind(profile.posts_analyzed)
    .bind(profile.fetched_at)
    .bind(profile.expires_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Newest profile for `user_id` that expires after `now`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_fresh_profile(
    pool: &PgPool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles \
         WHERE user_id = $1 AND expires_at > $2 \
         ORDER BY fetched_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Full profile history for `user_id`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_profiles(pool: &PgPool, user_id: i64) -> Result<Vec<ProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles \
         WHERE user_id = $1 \
         ORDER BY fetched_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
