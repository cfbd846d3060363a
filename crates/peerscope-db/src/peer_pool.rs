//! Database operations for the shared `peer_pool`.
//!
//! Entries are unique per `(pool_key, handle)`; concurrent discoveries of the
//! same peer collapse onto one row through `ON CONFLICT`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `peer_pool` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoolEntryRow {
    pub id: i64,
    pub handle: String,
    pub pool_key: String,
    pub niche: String,
    pub follower_count: i64,
    pub growth_rate: f64,
    pub is_valid: bool,
    pub last_validated: DateTime<Utc>,
    pub times_used: i64,
    /// Last known peer profile; `NULL` for rows added without one.
    pub snapshot: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Insert-or-refresh payload for [`upsert_pool_entry`].
#[derive(Debug, Clone)]
pub struct NewPoolEntry<'a> {
    pub handle: &'a str,
    pub pool_key: &'a str,
    pub niche: &'a str,
    pub follower_count: i64,
    pub growth_rate: f64,
    pub snapshot: Option<&'a Value>,
    pub validated_at: DateTime<Utc>,
}

/// Outcome of [`upsert_pool_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PoolUpsert {
    pub id: i64,
    /// `true` when a new row was created, `false` when an existing one was refreshed.
    pub inserted: bool,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct PoolCountsRow {
    pub total: i64,
    pub valid: i64,
    pub stale: i64,
    pub invalid: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoolUsageRow {
    pub handle: String,
    pub pool_key: String,
    pub times_used: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NicheCountRow {
    pub niche: String,
    pub entries: i64,
}

const POOL_COLUMNS: &str = "id, handle, pool_key, niche, follower_count, growth_rate, \
     is_valid, last_validated, times_used, snapshot, created_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a pool entry, or refreshes the existing `(pool_key, handle)` row.
///
/// The refresh path updates metrics, sets `last_validated`, and revalidates
/// the entry; `times_used` and `created_at` are kept. A `None` snapshot keeps
/// the stored one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_pool_entry(
    pool: &PgPool,
    entry: &NewPoolEntry<'_>,
) -> Result<PoolUpsert, DbError> {
    // xmax is 0 only for a freshly inserted tuple.
    let row = sqlx::query_as::<_, PoolUpsert>(
        "INSERT INTO peer_pool \
             (handle, pool_key, niche, follower_count, growth_rate, is_valid, \
              last_validated, times_used, snapshot) \
         VALUES ($1, $2, $3, $4, $5, TRUE, $6, 0, $7) \
         ON CONFLICT (pool_key, handle) DO UPDATE SET \
             follower_count = EXCLUDED.follower_count, \
             growth_rate    = EXCLUDED.growth_rate, \
             last_validated = EXCLUDED.last_validated, \
             is_valid       = TRUE, \
             snapshot       = COALESCE(EXCLUDED.snapshot, peer_pool.snapshot) \
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(entry.handle)
    .bind(entry.pool_key)
    .bind(entry.niche)
    .bind(entry.follower_count)
    .bind(entry.growth_rate)
    .bind(entry.validated_at)
    .bind(entry.snapshot)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Adds one to `times_used` for each listed handle in `pool_key`.
///
/// A handle listed twice is still counted once. Returns the rows updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn increment_pool_usage(
    pool: &PgPool,
    pool_key: &str,
    handles: &[String],
) -> Result<u64, DbError> {
    if handles.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE peer_pool SET times_used = times_used + 1 \
         WHERE pool_key = $1 AND handle = ANY($2)",
    )
    .bind(pool_key)
    .bind(handles)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Soft-deletes one entry. Returns whether a row matched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_pool_entry_invalid(
    pool: &PgPool,
    pool_key: &str,
    handle: &str,
) -> Result<bool, DbError> {
    let result =
        sqlx::query("UPDATE peer_pool SET is_valid = FALSE WHERE pool_key = $1 AND handle = $2")
            .bind(pool_key)
            .bind(handle)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Deletes entries last validated before `cutoff`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_stale_peers(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM peer_pool WHERE last_validated < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes every entry marked invalid. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_invalid_peers(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM peer_pool WHERE is_valid = FALSE")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Entries in `pool_key`, most used first, then most recently validated.
///
/// With `valid_after`, only valid entries validated after that instant are
/// returned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pool_entries(
    pool: &PgPool,
    pool_key: &str,
    valid_after: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<PoolEntryRow>, DbError> {
    let rows = sqlx::query_as::<_, PoolEntryRow>(&format!(
        "SELECT {POOL_COLUMNS} FROM peer_pool \
         WHERE pool_key = $1 \
           AND ($2::timestamptz IS NULL OR (is_valid AND last_validated > $2)) \
         ORDER BY times_used DESC, last_validated DESC, id ASC \
         LIMIT $3"
    ))
    .bind(pool_key)
    .bind(valid_after)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_pool_entry(
    pool: &PgPool,
    pool_key: &str,
    handle: &str,
) -> Result<Option<PoolEntryRow>, DbError> {
    let row = sqlx::query_as::<_, PoolEntryRow>(&format!(
        "SELECT {POOL_COLUMNS} FROM peer_pool WHERE pool_key = $1 AND handle = $2"
    ))
    .bind(pool_key)
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Entry counts, across all pools or scoped to one.
///
/// `valid` needs `is_valid` and validation after `valid_cutoff`; `stale` is
/// anything validated before it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn pool_counts(
    pool: &PgPool,
    pool_key: Option<&str>,
    valid_cutoff: DateTime<Utc>,
) -> Result<PoolCountsRow, DbError> {
    let row = sqlx::query_as::<_, PoolCountsRow>(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE is_valid AND last_validated > $2) AS valid, \
                COUNT(*) FILTER (WHERE last_validated < $2) AS stale, \
                COUNT(*) FILTER (WHERE NOT is_valid) AS invalid \
         FROM peer_pool \
         WHERE ($1::text IS NULL OR pool_key = $1)",
    )
    .bind(pool_key)
    .bind(valid_cutoff)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// The most used valid entries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn most_used_pool_entries(
    pool: &PgPool,
    pool_key: Option<&str>,
    limit: i64,
) -> Result<Vec<PoolUsageRow>, DbError> {
    let rows = sqlx::query_as::<_, PoolUsageRow>(
        "SELECT handle, pool_key, times_used FROM peer_pool \
         WHERE is_valid AND ($1::text IS NULL OR pool_key = $1) \
         ORDER BY times_used DESC, handle ASC \
         LIMIT $2",
    )
    .bind(pool_key)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Entry count per niche across all pools.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn pool_niche_counts(pool: &PgPool) -> Result<Vec<NicheCountRow>, DbError> {
    let rows = sqlx::query_as::<_, NicheCountRow>(
        "SELECT niche, COUNT(*) AS entries FROM peer_pool GROUP BY niche ORDER BY niche",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
