//! Database operations for `tweet_cache`.
//!
//! The table is an append-only fetch log; freshness is decided by the caller
//! passing a cutoff timestamp.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `tweet_cache` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TweetCacheRow {
    pub id: i64,
    pub handle: String,
    /// Posts as a JSON array, newest first.
    pub posts: Value,
    pub post_count: i32,
    pub fetched_at: DateTime<Utc>,
}

/// Entry counts for the cache as a whole.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct TweetCacheCountsRow {
    pub total: i64,
    pub fresh: i64,
}

/// Appends one fetch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_tweet_cache(
    pool: &PgPool,
    handle: &str,
    posts: &Value,
    post_count: i32,
    fetched_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO tweet_cache (handle, posts, post_count, fetched_at) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(handle)
    .bind(posts)
    .bind(post_count)
    .bind(fetched_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Newest entry for `handle` fetched strictly after `cutoff`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_tweet_cache_since(
    pool: &PgPool,
    handle: &str,
    cutoff: DateTime<Utc>,
) -> Result<Option<TweetCacheRow>, DbError> {
    let row = sqlx::query_as::<_, TweetCacheRow>(
        "SELECT id, handle, posts, post_count, fetched_at FROM tweet_cache \
         WHERE handle = $1 AND fetched_at > $2 \
         ORDER BY fetched_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(handle)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Deletes every entry for `handle`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_tweet_cache_for_handle(pool: &PgPool, handle: &str) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM tweet_cache WHERE handle = $1")
        .bind(handle)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes entries fetched before `cutoff`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_tweet_cache_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM tweet_cache WHERE fetched_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Total entries, and those fetched after `fresh_cutoff`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn tweet_cache_counts(
    pool: &PgPool,
    fresh_cutoff: DateTime<Utc>,
) -> Result<TweetCacheCountsRow, DbError> {
    let row = sqlx::query_as::<_, TweetCacheCountsRow>(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE fetched_at > $1) AS fresh \
         FROM tweet_cache",
    )
    .bind(fresh_cutoff)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
