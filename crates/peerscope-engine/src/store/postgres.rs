use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerscope_core::{
    BasicMetrics, Handle, PeerPoolEntry, PeerRecord, Post, ProfileRecord, PoolUsageLeader,
};
use peerscope_db::{
    AnalysisRow, DbError, NewAnalysis, NewPeerMatch, NewPoolEntry, NewProfile, PoolEntryRow,
    ProfileRow, UserRow,
};
use sqlx::PgPool;

use super::{
    AnalysisRecord, AnalysisStore, NewAnalysisRecord, NewProfileRecord, PoolCounts,
    PoolEntryUpsert, TweetCacheCounts, TweetCacheEntry, UserAccount,
};

/// [`AnalysisStore`] backed by Postgres through `peerscope-db`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> DbError {
    DbError::Sqlx(sqlx::Error::Decode(Box::new(err)))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn limit_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn user_from_row(row: UserRow) -> Result<UserAccount, DbError> {
    Ok(UserAccount {
        id: row.id,
        handle: Handle::parse(&row.handle).map_err(decode_error)?,
        external_id: row.external_id,
        created_at: row.created_at,
        last_analysis_at: row.last_analysis_at,
    })
}

fn profile_from_row(row: ProfileRow) -> Result<ProfileRecord, DbError> {
    Ok(ProfileRecord {
        id: row.id,
        user_id: row.user_id,
        handle: Handle::parse(&row.handle).map_err(decode_error)?,
        metrics: BasicMetrics {
            followers: to_u64(row.followers),
            following: to_u64(row.following),
            post_count: to_u64(row.post_count),
            follower_following_ratio: row.follower_following_ratio,
        },
        derived: serde_json::from_value(row.derived).map_err(decode_error)?,
        niche: row.niche,
        posts_analyzed: u32::try_from(row.posts_analyzed).unwrap_or(0),
        fetched_at: row.fetched_at,
        expires_at: row.expires_at,
    })
}

fn pool_entry_from_row(row: PoolEntryRow) -> Result<PeerPoolEntry, DbError> {
    Ok(PeerPoolEntry {
        id: row.id,
        handle: Handle::parse(&row.handle).map_err(decode_error)?,
        pool_key: row.pool_key,
        niche: row.niche,
        follower_count: to_u64(row.follower_count),
        growth_rate: row.growth_rate,
        is_valid: row.is_valid,
        last_validated: row.last_validated,
        times_used: to_u64(row.times_used),
        created_at: row.created_at,
        snapshot: row.snapshot,
    })
}

fn analysis_from_row(row: AnalysisRow) -> AnalysisRecord {
    AnalysisRecord {
        id: row.id,
        public_id: row.public_id,
        user_id: row.user_id,
        profile_id: row.profile_id,
        growth_score: row.growth_score,
        report: row.report,
        peer_handles: row.peer_handles,
        peer_source: row.peer_source,
        cost_summary: row.cost_summary,
        created_at: row.created_at,
    }
}

#[async_trait]
impl AnalysisStore for PgStore {
    async fn upsert_user(
        &self,
        handle: &Handle,
        external_id: Option<&str>,
    ) -> Result<UserAccount, DbError> {
        let row = peerscope_db::upsert_user(&self.pool, handle.as_str(), external_id).await?;
        user_from_row(row)
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserAccount>, DbError> {
        peerscope_db::get_user(&self.pool, id)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn touch_last_analysis(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), DbError> {
        peerscope_db::touch_last_analysis(&self.pool, user_id, at).await
    }

    async fn insert_profile(&self, profile: &NewProfileRecord) -> Result<ProfileRecord, DbError> {
        let derived = serde_json::to_value(&profile.derived).map_err(decode_error)?;
        let row = peerscope_db::insert_profile(
            &self.pool,
            &NewProfile {
                user_id: profile.user_id,
                handle: profile.handle.as_str(),
                followers: to_i64(profile.metrics.followers),
                following: to_i64(profile.metrics.following),
                post_count: to_i64(profile.metrics.post_count),
                follower_following_ratio: profile.metrics.follower_following_ratio,
                derived: &derived,
                niche: &profile.niche,
                posts_analyzed: i32::try_from(profile.posts_analyzed).unwrap_or(i32::MAX),
                fetched_at: profile.fetched_at,
                expires_at: profile.expires_at,
            },
        )
        .await?;
        profile_from_row(row)
    }

    async fn latest_fresh_profile(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ProfileRecord>, DbError> {
        peerscope_db::latest_fresh_profile(&self.pool, user_id, now)
            .await?
            .map(profile_from_row)
            .transpose()
    }

    async fn append_tweets(
        &self,
        handle: &Handle,
        posts: &[Post],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let value = serde_json::to_value(posts).map_err(decode_error)?;
        let count = i32::try_from(posts.len()).unwrap_or(i32::MAX);
        peerscope_db::insert_tweet_cache(&self.pool, handle.as_str(), &value, count, fetched_at)
            .await?;
        Ok(())
    }

    async fn latest_tweets_since(
        &self,
        handle: &Handle,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<TweetCacheEntry>, DbError> {
        let Some(row) =
            peerscope_db::latest_tweet_cache_since(&self.pool, handle.as_str(), cutoff).await?
        else {
            return Ok(None);
        };
        let posts: Vec<Post> = serde_json::from_value(row.posts).map_err(decode_error)?;
        Ok(Some(TweetCacheEntry {
            handle: handle.clone(),
            posts,
            fetched_at: row.fetched_at,
        }))
    }

    async fn delete_tweets_for_handle(&self, handle: &Handle) -> Result<u64, DbError> {
        peerscope_db::delete_tweet_cache_for_handle(&self.pool, handle.as_str()).await
    }

    async fn delete_tweets_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        peerscope_db::delete_tweet_cache_before(&self.pool, cutoff).await
    }

    async fn tweet_counts(&self, fresh_cutoff: DateTime<Utc>) -> Result<TweetCacheCounts, DbError> {
        let row = peerscope_db::tweet_cache_counts(&self.pool, fresh_cutoff).await?;
        Ok(TweetCacheCounts {
            total: to_u64(row.total),
            fresh: to_u64(row.fresh),
        })
    }

    async fn upsert_pool_entry(&self, entry: &PoolEntryUpsert) -> Result<bool, DbError> {
        let outcome = peerscope_db::upsert_pool_entry(
            &self.pool,
            &NewPoolEntry {
                handle: entry.handle.as_str(),
                pool_key: &entry.pool_key,
                niche: &entry.niche,
                follower_count: to_i64(entry.follower_count),
                growth_rate: entry.growth_rate,
                snapshot: entry.snapshot.as_ref(),
                validated_at: entry.validated_at,
            },
        )
        .await?;
        Ok(outcome.inserted)
    }

    async fn list_pool_entries(
        &self,
        pool_key: &str,
        valid_after: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PeerPoolEntry>, DbError> {
        peerscope_db::list_pool_entries(&self.pool, pool_key, valid_after, limit_i64(limit))
            .await?
            .into_iter()
            .map(pool_entry_from_row)
            .collect()
    }

    async fn increment_pool_usage(
        &self,
        pool_key: &str,
        handles: &[Handle],
    ) -> Result<u64, DbError> {
        let handles: Vec<String> = handles.iter().map(ToString::to_string).collect();
        peerscope_db::increment_pool_usage(&self.pool, pool_key, &handles).await
    }

    async fn mark_pool_entry_invalid(
        &self,
        pool_key: &str,
        handle: &Handle,
    ) -> Result<bool, DbError> {
        peerscope_db::mark_pool_entry_invalid(&self.pool, pool_key, handle.as_str()).await
    }

    async fn delete_stale_pool_entries(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        peerscope_db::delete_stale_peers(&self.pool, cutoff).await
    }

    async fn delete_invalid_pool_entries(&self) -> Result<u64, DbError> {
        peerscope_db::delete_invalid_peers(&self.pool).await
    }

    async fn pool_counts(
        &self,
        pool_key: Option<&str>,
        valid_cutoff: DateTime<Utc>,
    ) -> Result<PoolCounts, DbError> {
        let row = peerscope_db::pool_counts(&self.pool, pool_key, valid_cutoff).await?;
        Ok(PoolCounts {
            total: to_u64(row.total),
            valid: to_u64(row.valid),
            stale: to_u64(row.stale),
            invalid: to_u64(row.invalid),
        })
    }

    async fn most_used_pool_entries(
        &self,
        pool_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PoolUsageLeader>, DbError> {
        peerscope_db::most_used_pool_entries(&self.pool, pool_key, limit_i64(limit))
            .await?
            .into_iter()
            .map(|row| {
                Ok(PoolUsageLeader {
                    handle: Handle::parse(&row.handle).map_err(decode_error)?,
                    pool_key: row.pool_key,
                    times_used: to_u64(row.times_used),
                })
            })
            .collect()
    }

    async fn pool_niche_counts(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let rows = peerscope_db::pool_niche_counts(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.niche, to_u64(row.entries)))
            .collect())
    }

    async fn replace_peer_assignments(
        &self,
        user_id: i64,
        peers: &[PeerRecord],
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let matches = peers
            .iter()
            .map(|peer| {
                Ok(NewPeerMatch {
                    peer_handle: peer.handle.to_string(),
                    peer_followers: to_i64(peer.followers),
                    peer_snapshot: serde_json::to_value(peer).map_err(decode_error)?,
                    match_score: peer.match_score,
                    match_reason: peer.match_reason.clone(),
                    growth_edge: peer.growth_edge.clone(),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        peerscope_db::replace_peer_matches(&self.pool, user_id, &matches, created_at, expires_at)
            .await
    }

    async fn fresh_peer_assignments(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PeerRecord>, DbError> {
        let rows =
            peerscope_db::fresh_peer_matches(&self.pool, user_id, now, limit_i64(limit)).await?;
        let mut peers = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<PeerRecord>(row.peer_snapshot) {
                Ok(peer) => peers.push(peer),
                Err(e) => tracing::warn!(
                    user_id,
                    peer = %row.peer_handle,
                    error = %e,
                    "skipping peer assignment with undecodable snapshot"
                ),
            }
        }
        Ok(peers)
    }

    async fn insert_analysis(
        &self,
        analysis: &NewAnalysisRecord,
    ) -> Result<AnalysisRecord, DbError> {
        let row = peerscope_db::insert_analysis(
            &self.pool,
            &NewAnalysis {
                user_id: analysis.user_id,
                profile_id: analysis.profile_id,
                growth_score: analysis.growth_score,
                report: &analysis.report,
                peer_handles: &analysis.peer_handles,
                peer_source: &analysis.peer_source,
                cost_summary: &analysis.cost_summary,
                created_at: analysis.created_at,
            },
        )
        .await?;
        Ok(analysis_from_row(row))
    }

    async fn latest_analysis(&self, user_id: i64) -> Result<Option<AnalysisRecord>, DbError> {
        Ok(peerscope_db::latest_analysis(&self.pool, user_id)
            .await?
            .map(analysis_from_row))
    }
}
