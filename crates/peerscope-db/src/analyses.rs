//! Database operations for `analyses`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub profile_id: Option<i64>,
    pub growth_score: f64,
    pub report: Value,
    pub peer_handles: Vec<String>,
    /// Where the peers came from: `assignments`, `pool`, `discovery` or `mixed`.
    pub peer_source: String,
    pub cost_summary: Value,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`insert_analysis`].
#[derive(Debug, Clone)]
pub struct NewAnalysis<'a> {
    pub user_id: i64,
    pub profile_id: Option<i64>,
    pub growth_score: f64,
    pub report: &'a Value,
    pub peer_handles: &'a [String],
    pub peer_source: &'a str,
    pub cost_summary: &'a Value,
    pub created_at: DateTime<Utc>,
}

const ANALYSIS_COLUMNS: &str = "id, public_id, user_id, profile_id, growth_score, report, \
     peer_handles, peer_source, cost_summary, created_at";

/// Inserts an analysis. Generates the `public_id` in Rust.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_analysis(
    pool: &PgPool,
    analysis: &NewAnalysis<'_>,
) -> Result<AnalysisRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "INSERT INTO analyses \
             (public_id, user_id, profile_id, growth_score, report, peer_handles, \
              peer_source, cost_summary, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {ANALYSIS_COLUMNS}"
    ))
    .bind(public_id)
    .bind(analysis.user_id)
    .bind(analysis.profile_id)
    .bind(analysis.growth_score)
    .bind(analysis.report)
    .bind(analysis.peer_handles)
    .bind(analysis.peer_source)
    .bind(analysis.cost_summary)
    .bind(analysis.created_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_analysis(pool: &PgPool, public_id: Uuid) -> Result<Option<AnalysisRow>, DbError> {
    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The user's most recent analysis.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_analysis(pool: &PgPool, user_id: i64) -> Result<Option<AnalysisRow>, DbError> {
    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM analyses \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
