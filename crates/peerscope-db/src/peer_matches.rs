//! Database operations for `peer_matches`, the per-user peer assignments.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `peer_matches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PeerMatchRow {
    pub id: i64,
    pub user_id: i64,
    pub peer_handle: String,
    pub peer_followers: i64,
    pub peer_snapshot: Value,
    pub match_score: f64,
    pub match_reason: String,
    pub growth_edge: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Insert payload for [`replace_peer_matches`].
#[derive(Debug, Clone)]
pub struct NewPeerMatch {
    pub peer_handle: String,
    pub peer_followers: i64,
    pub peer_snapshot: Value,
    pub match_score: f64,
    pub match_reason: String,
    pub growth_edge: String,
}

/// Replaces all of a user's assignments in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is changed then.
pub async fn replace_peer_matches(
    pool: &PgPool,
    user_id: i64,
    matches: &[NewPeerMatch],
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM peer_matches WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for m in matches {
        sqlx::query(
            "INSERT INTO peer_matches \
                 (user_id, peer_handle, peer_followers, peer_snapshot, match_score, \
                  match_reason, growth_edge, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(user_id)
        .bind(&m.peer_handle)
        .bind(m.peer_followers)
        .bind(&m.peer_snapshot)
        .bind(m.match_score)
        .bind(&m.match_reason)
        .bind(&m.growth_edge)
        .bind(created_at)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Unexpired assignments for `user_id`, best match first, at most `limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fresh_peer_matches(
    pool: &PgPool,
    user_id: i64,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<PeerMatchRow>, DbError> {
    let rows = sqlx::query_as::<_, PeerMatchRow>(
        "SELECT id, user_id, peer_handle, peer_followers, peer_snapshot, match_score, \
                match_reason, growth_edge, created_at, expires_at \
         FROM peer_matches \
         WHERE user_id = $1 AND expires_at > $2 \
         ORDER BY created_at DESC, match_score DESC, id ASC \
         LIMIT $3",
    )
    .bind(user_id)
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
