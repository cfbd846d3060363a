//! Storage seam for the engine.
//!
//! [`AnalysisStore`] speaks domain types. [`PgStore`] maps them onto the
//! `peerscope-db` query functions; [`MemoryStore`] keeps them in process with
//! the same ordering, filtering and upsert rules.

mod memory;
mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerscope_core::{
    BasicMetrics, DerivedProfile, Handle, PeerPoolEntry, PeerRecord, Post, ProfileRecord,
    PoolUsageLeader,
};
use peerscope_db::DbError;
use serde_json::Value;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub id: i64,
    pub handle: Handle,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_analysis_at: Option<DateTime<Utc>>,
}

/// A profile about to be cached. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewProfileRecord {
    pub user_id: i64,
    pub handle: Handle,
    pub metrics: BasicMetrics,
    pub derived: DerivedProfile,
    pub niche: String,
    pub posts_analyzed: u32,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One fetch in the tweet cache log.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetCacheEntry {
    pub handle: Handle,
    pub posts: Vec<Post>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TweetCacheCounts {
    pub total: u64,
    pub fresh: u64,
}

/// Insert-or-refresh payload for one pool entry.
#[derive(Debug, Clone)]
pub struct PoolEntryUpsert {
    pub handle: Handle,
    pub pool_key: String,
    pub niche: String,
    pub follower_count: u64,
    pub growth_rate: f64,
    pub snapshot: Option<Value>,
    pub validated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounts {
    pub total: u64,
    pub valid: u64,
    pub stale: u64,
    pub invalid: u64,
}

#[derive(Debug, Clone)]
pub struct NewAnalysisRecord {
    pub user_id: i64,
    pub profile_id: Option<i64>,
    pub growth_score: f64,
    pub report: Value,
    pub peer_handles: Vec<String>,
    pub peer_source: String,
    pub cost_summary: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub profile_id: Option<i64>,
    pub growth_score: f64,
    pub report: Value,
    pub peer_handles: Vec<String>,
    pub peer_source: String,
    pub cost_summary: Value,
    pub created_at: DateTime<Utc>,
}

/// Persistence used by the caches, the pool and the orchestrator.
///
/// Every method fails with [`DbError`] when the backing store does.
#[allow(clippy::missing_errors_doc)]
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    // Users

    async fn upsert_user(
        &self,
        handle: &Handle,
        external_id: Option<&str>,
    ) -> Result<UserAccount, DbError>;

    async fn get_user(&self, id: i64) -> Result<Option<UserAccount>, DbError>;

    /// Fails with [`DbError::NotFound`] if no user has that id.
    async fn touch_last_analysis(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), DbError>;

    // Profiles

    async fn insert_profile(&self, profile: &NewProfileRecord) -> Result<ProfileRecord, DbError>;

    /// Newest profile for the user with `expires_at > now`.
    async fn latest_fresh_profile(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ProfileRecord>, DbError>;

    // Tweet cache

    async fn append_tweets(
        &self,
        handle: &Handle,
        posts: &[Post],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Newest entry for `handle` fetched strictly after `cutoff`.
    async fn latest_tweets_since(
        &self,
        handle: &Handle,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<TweetCacheEntry>, DbError>;

    async fn delete_tweets_for_handle(&self, handle: &Handle) -> Result<u64, DbError>;

    async fn delete_tweets_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError>;

    async fn tweet_counts(&self, fresh_cutoff: DateTime<Utc>) -> Result<TweetCacheCounts, DbError>;

    // Peer pool

    /// Returns `true` when a new entry was created.
    async fn upsert_pool_entry(&self, entry: &PoolEntryUpsert) -> Result<bool, DbError>;

    /// Entries in `pool_key`, most used first, then most recently validated.
    /// With `valid_after`, only valid entries validated after it.
    async fn list_pool_entries(
        &self,
        pool_key: &str,
        valid_after: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PeerPoolEntry>, DbError>;

    async fn increment_pool_usage(&self, pool_key: &str, handles: &[Handle])
        -> Result<u64, DbError>;

    async fn mark_pool_entry_invalid(&self, pool_key: &str, handle: &Handle)
        -> Result<bool, DbError>;

    async fn delete_stale_pool_entries(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError>;

    async fn delete_invalid_pool_entries(&self) -> Result<u64, DbError>;

    async fn pool_counts(
        &self,
        pool_key: Option<&str>,
        valid_cutoff: DateTime<Utc>,
    ) -> Result<PoolCounts, DbError>;

    async fn most_used_pool_entries(
        &self,
        pool_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PoolUsageLeader>, DbError>;

    async fn pool_niche_counts(&self) -> Result<BTreeMap<String, u64>, DbError>;

    // Per-user peer assignments

    /// Replaces every assignment for the user atomically.
    async fn replace_peer_assignments(
        &self,
        user_id: i64,
        peers: &[PeerRecord],
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn fresh_peer_assignments(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PeerRecord>, DbError>;

    // Analyses

    async fn insert_analysis(&self, analysis: &NewAnalysisRecord)
        -> Result<AnalysisRecord, DbError>;

    async fn latest_analysis(&self, user_id: i64) -> Result<Option<AnalysisRecord>, DbError>;
}
