use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerscope_core::{Handle, PeerPoolEntry, PeerRecord, Post, ProfileRecord, PoolUsageLeader};
use peerscope_db::DbError;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};

use super::{
    AnalysisRecord, AnalysisStore, NewAnalysisRecord, NewProfileRecord, PoolCounts,
    PoolEntryUpsert, TweetCacheCounts, TweetCacheEntry, UserAccount,
};

#[derive(Debug, Clone)]
struct StoredAssignment {
    id: i64,
    user_id: i64,
    peer: PeerRecord,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    users: Vec<UserAccount>,
    profiles: Vec<ProfileRecord>,
    tweets: Vec<(i64, TweetCacheEntry)>,
    pool: Vec<PeerPoolEntry>,
    assignments: Vec<StoredAssignment>,
    analyses: Vec<AnalysisRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`AnalysisStore`] with the same semantics as the Postgres one.
///
/// Used by tests and dry runs; nothing survives the process. Row defaults
/// that Postgres fills with `now()` come from the store's clock.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    /// Every cached profile for the user, newest first, expired ones included.
    #[must_use]
    pub fn profile_history(&self, user_id: i64) -> Vec<ProfileRecord> {
        let state = self.lock();
        let mut rows: Vec<ProfileRecord> = state
            .profiles
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)));
        rows
    }

    /// Every entry in one pool, valid or not, in selection order.
    #[must_use]
    pub fn pool_entries(&self, pool_key: &str) -> Vec<PeerPoolEntry> {
        let state = self.lock();
        let mut rows: Vec<PeerPoolEntry> = state
            .pool
            .iter()
            .filter(|e| e.pool_key == pool_key)
            .cloned()
            .collect();
        rows.sort_by(selection_order);
        rows
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn selection_order(a: &PeerPoolEntry, b: &PeerPoolEntry) -> Ordering {
    b.times_used
        .cmp(&a.times_used)
        .then(b.last_validated.cmp(&a.last_validated))
        .then(a.id.cmp(&b.id))
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn upsert_user(
        &self,
        handle: &Handle,
        external_id: Option<&str>,
    ) -> Result<UserAccount, DbError> {
        let mut state = self.lock();
        if let Some(user) = state.users.iter_mut().find(|u| &u.handle == handle) {
            if user.external_id.is_none() {
                user.external_id = external_id.map(str::to_string);
            }
            return Ok(user.clone());
        }
        let user = UserAccount {
            id: state.next_id(),
            handle: handle.clone(),
            external_id: external_id.map(str::to_string),
            created_at: self.clock.now(),
            last_analysis_at: None,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserAccount>, DbError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn touch_last_analysis(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), DbError> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DbError::NotFound)?;
        user.last_analysis_at = Some(at);
        Ok(())
    }

    async fn insert_profile(&self, profile: &NewProfileRecord) -> Result<ProfileRecord, DbError> {
        let mut state = self.lock();
        let record = ProfileRecord {
            id: state.next_id(),
            user_id: profile.user_id,
            handle: profile.handle.clone(),
            metrics: profile.metrics,
            derived: profile.derived.clone(),
            niche: profile.niche.clone(),
            posts_analyzed: profile.posts_analyzed,
            fetched_at: profile.fetched_at,
            expires_at: profile.expires_at,
        };
        state.profiles.push(record.clone());
        Ok(record)
    }

    async fn latest_fresh_profile(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ProfileRecord>, DbError> {
        Ok(self
            .lock()
            .profiles
            .iter()
            .filter(|p| p.user_id == user_id && p.expires_at > now)
            .max_by(|a, b| a.fetched_at.cmp(&b.fetched_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn append_tweets(
        &self,
        handle: &Handle,
        posts: &[Post],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let id = state.next_id();
        state.tweets.push((
            id,
            TweetCacheEntry {
                handle: handle.clone(),
                posts: posts.to_vec(),
                fetched_at,
            },
        ));
        Ok(())
    }

    async fn latest_tweets_since(
        &self,
        handle: &Handle,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<TweetCacheEntry>, DbError> {
        Ok(self
            .lock()
            .tweets
            .iter()
            .filter(|(_, e)| &e.handle == handle && e.fetched_at > cutoff)
            .max_by(|(a_id, a), (b_id, b)| a.fetched_at.cmp(&b.fetched_at).then(a_id.cmp(b_id)))
            .map(|(_, e)| e.clone()))
    }

    async fn delete_tweets_for_handle(&self, handle: &Handle) -> Result<u64, DbError> {
        let mut state = self.lock();
        let before = state.tweets.len();
        state.tweets.retain(|(_, e)| &e.handle != handle);
        Ok((before - state.tweets.len()) as u64)
    }

    async fn delete_tweets_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut state = self.lock();
        let before = state.tweets.len();
        state.tweets.retain(|(_, e)| e.fetched_at >= cutoff);
        Ok((before - state.tweets.len()) as u64)
    }

    async fn tweet_counts(&self, fresh_cutoff: DateTime<Utc>) -> Result<TweetCacheCounts, DbError> {
        let state = self.lock();
        Ok(TweetCacheCounts {
            total: state.tweets.len() as u64,
            fresh: state
                .tweets
                .iter()
                .filter(|(_, e)| e.fetched_at > fresh_cutoff)
                .count() as u64,
        })
    }

    async fn upsert_pool_entry(&self, entry: &PoolEntryUpsert) -> Result<bool, DbError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .pool
            .iter_mut()
            .find(|e| e.pool_key == entry.pool_key && e.handle == entry.handle)
        {
            existing.follower_count = entry.follower_count;
            existing.growth_rate = entry.growth_rate;
            existing.last_validated = entry.validated_at;
            existing.is_valid = true;
            if entry.snapshot.is_some() {
                existing.snapshot.clone_from(&entry.snapshot);
            }
            return Ok(false);
        }
        let id = state.next_id();
        state.pool.push(PeerPoolEntry {
            id,
            handle: entry.handle.clone(),
            pool_key: entry.pool_key.clone(),
            niche: entry.niche.clone(),
            follower_count: entry.follower_count,
            growth_rate: entry.growth_rate,
            is_valid: true,
            last_validated: entry.validated_at,
            times_used: 0,
            created_at: entry.validated_at,
            snapshot: entry.snapshot.clone(),
        });
        Ok(true)
    }

    async fn list_pool_entries(
        &self,
        pool_key: &str,
        valid_after: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PeerPoolEntry>, DbError> {
        let mut rows: Vec<PeerPoolEntry> = self
            .lock()
            .pool
            .iter()
            .filter(|e| e.pool_key == pool_key)
            .filter(|e| valid_after.is_none_or(|after| e.is_valid && e.last_validated > after))
            .cloned()
            .collect();
        rows.sort_by(selection_order);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn increment_pool_usage(
        &self,
        pool_key: &str,
        handles: &[Handle],
    ) -> Result<u64, DbError> {
        let mut state = self.lock();
        let mut updated = 0;
        for entry in state
            .pool
            .iter_mut()
            .filter(|e| e.pool_key == pool_key && handles.contains(&e.handle))
        {
            entry.times_used += 1;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_pool_entry_invalid(
        &self,
        pool_key: &str,
        handle: &Handle,
    ) -> Result<bool, DbError> {
        let mut state = self.lock();
        let mut matched = false;
        for entry in state
            .pool
            .iter_mut()
            .filter(|e| e.pool_key == pool_key && &e.handle == handle)
        {
            entry.is_valid = false;
            matched = true;
        }
        Ok(matched)
    }

    async fn delete_stale_pool_entries(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut state = self.lock();
        let before = state.pool.len();
        state.pool.retain(|e| e.last_validated >= cutoff);
        Ok((before - state.pool.len()) as u64)
    }

    async fn delete_invalid_pool_entries(&self) -> Result<u64, DbError> {
        let mut state = self.lock();
        let before = state.pool.len();
        state.pool.retain(|e| e.is_valid);
        Ok((before - state.pool.len()) as u64)
    }

    async fn pool_counts(
        &self,
        pool_key: Option<&str>,
        valid_cutoff: DateTime<Utc>,
    ) -> Result<PoolCounts, DbError> {
        let state = self.lock();
        let mut counts = PoolCounts::default();
        for entry in state
            .pool
            .iter()
            .filter(|e| pool_key.is_none_or(|key| e.pool_key == key))
        {
            counts.total += 1;
            if entry.is_valid && entry.last_validated > valid_cutoff {
                counts.valid += 1;
            }
            if entry.last_validated < valid_cutoff {
                counts.stale += 1;
            }
            if !entry.is_valid {
                counts.invalid += 1;
            }
        }
        Ok(counts)
    }

    async fn most_used_pool_entries(
        &self,
        pool_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PoolUsageLeader>, DbError> {
        let state = self.lock();
        let mut rows: Vec<&PeerPoolEntry> = state
            .pool
            .iter()
            .filter(|e| e.is_valid && pool_key.is_none_or(|key| e.pool_key == key))
            .collect();
        rows.sort_by(|a, b| b.times_used.cmp(&a.times_used).then(a.handle.cmp(&b.handle)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|e| PoolUsageLeader {
                handle: e.handle.clone(),
                pool_key: e.pool_key.clone(),
                times_used: e.times_used,
            })
            .collect())
    }

    async fn pool_niche_counts(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let mut counts = BTreeMap::new();
        for entry in &self.lock().pool {
            *counts.entry(entry.niche.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn replace_peer_assignments(
        &self,
        user_id: i64,
        peers: &[PeerRecord],
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        state.assignments.retain(|a| a.user_id != user_id);
        for peer in peers {
            let id = state.next_id();
            state.assignments.push(StoredAssignment {
                id,
                user_id,
                peer: peer.clone(),
                created_at,
                expires_at,
            });
        }
        Ok(())
    }

    async fn fresh_peer_assignments(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PeerRecord>, DbError> {
        let state = self.lock();
        let mut rows: Vec<&StoredAssignment> = state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.expires_at > now)
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.peer.match_score.total_cmp(&a.peer.match_score))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows.into_iter().take(limit).map(|a| a.peer.clone()).collect())
    }

    async fn insert_analysis(
        &self,
        analysis: &NewAnalysisRecord,
    ) -> Result<AnalysisRecord, DbError> {
        let mut state = self.lock();
        let record = AnalysisRecord {
            id: state.next_id(),
            public_id: Uuid::new_v4(),
            user_id: analysis.user_id,
            profile_id: analysis.profile_id,
            growth_score: analysis.growth_score,
            report: analysis.report.clone(),
            peer_handles: analysis.peer_handles.clone(),
            peer_source: analysis.peer_source.clone(),
            cost_summary: analysis.cost_summary.clone(),
            created_at: analysis.created_at,
        };
        state.analyses.push(record.clone());
        Ok(record)
    }

    async fn latest_analysis(&self, user_id: i64) -> Result<Option<AnalysisRecord>, DbError> {
        Ok(self
            .lock()
            .analyses
            .iter()
            .filter(|a| a.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }
}
