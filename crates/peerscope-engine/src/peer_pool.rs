//! Shared cross-user pool of peer accounts, partitioned by [`PoolKey`].
//!
//! Peer discovery is the most expensive call in a run, so every discovered
//! peer is kept here and handed to later users with the same niche and
//! follower band. Selection favours the most used entries.

use std::sync::Arc;

use chrono::Duration;
use peerscope_core::{
    AppConfig, Handle, PeerPoolEntry, PeerRecord, PoolKey, PoolStats, RunContext,
    SocialDataSource,
};
use peerscope_db::DbError;

use crate::clock::Clock;
use crate::store::{AnalysisStore, PoolEntryUpsert};

/// How many of the most used entries [`PeerPool::stats`] reports.
const TOP_USED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerPoolSettings {
    /// Entries validated longer ago than this are not served.
    pub validation_days: i64,
    /// Default age for [`PeerPool::cleanup_stale`].
    pub stale_days: i64,
}

impl Default for PeerPoolSettings {
    fn default() -> Self {
        Self {
            validation_days: 7,
            stale_days: 30,
        }
    }
}

impl PeerPoolSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            validation_days: config.pool_validation_days,
            stale_days: config.pool_stale_days,
        }
    }
}

#[derive(Clone)]
pub struct PeerPool {
    store: Arc<dyn AnalysisStore>,
    clock: Arc<dyn Clock>,
    settings: PeerPoolSettings,
}

impl PeerPool {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        clock: Arc<dyn Clock>,
        settings: PeerPoolSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PeerPoolSettings {
        &self.settings
    }

    #[must_use]
    pub fn pool_key(niche: &str, followers: u64) -> PoolKey {
        PoolKey::new(niche, followers)
    }

    /// Handles of up to `count` peers for an account of this niche and size.
    ///
    /// Fewer than `count` comes back when the pool is smaller; an empty list
    /// is a pool miss.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store read fails.
    pub async fn get_peers(
        &self,
        niche: &str,
        followers: u64,
        count: usize,
        require_valid: bool,
    ) -> Result<Vec<Handle>, DbError> {
        let key = Self::pool_key(niche, followers);
        let entries = self.get_peer_entries(&key, count, require_valid).await?;
        Ok(entries.into_iter().map(|e| e.handle).collect())
    }

    /// Like [`PeerPool::get_peers`] but returns whole entries for a known key.
    ///
    /// Twice `count` rows are read so callers filtering the result still have
    /// enough; the result is cut back to `count`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store read fails.
    pub async fn get_peer_entries(
        &self,
        key: &PoolKey,
        count: usize,
        require_valid: bool,
    ) -> Result<Vec<PeerPoolEntry>, DbError> {
        let pool_key = key.to_string();
        let valid_after = require_valid
            .then(|| self.clock.now() - Duration::days(self.settings.validation_days));
        let mut entries = self
            .store
            .list_pool_entries(&pool_key, valid_after, count.saturating_mul(2))
            .await?;

        if entries.is_empty() {
            tracing::info!(pool_key = %pool_key, "pool miss");
            return Ok(entries);
        }
        entries.truncate(count);
        tracing::info!(pool_key = %pool_key, peers = entries.len(), "pool hit");
        Ok(entries)
    }

    /// Upserts peers into the pool. Returns how many were new.
    ///
    /// Without an explicit key the key is derived from the peers' average
    /// follower count. Re-sighted peers get their metrics refreshed and are
    /// revalidated; their usage count is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on the first failed upsert; earlier ones stay.
    pub async fn add_peers(
        &self,
        peers: &[PeerRecord],
        niche: &str,
        key: Option<&PoolKey>,
    ) -> Result<usize, DbError> {
        if peers.is_empty() {
            return Ok(0);
        }
        let key = match key {
            Some(key) => key.clone(),
            None => Self::pool_key(niche, average_followers(peers)),
        };
        let pool_key = key.to_string();
        let now = self.clock.now();

        let mut added = 0;
        for peer in peers {
            let snapshot = match serde_json::to_value(peer) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(peer = %peer.handle, error = %e, "peer snapshot not encodable");
                    None
                }
            };
            let inserted = self
                .store
                .upsert_pool_entry(&PoolEntryUpsert {
                    handle: peer.handle.clone(),
                    pool_key: pool_key.clone(),
                    niche: niche.to_string(),
                    follower_count: peer.followers,
                    growth_rate: peer.growth_rate(),
                    snapshot,
                    validated_at: now,
                })
                .await?;
            if inserted {
                added += 1;
            }
        }

        tracing::info!(pool_key = %pool_key, added, updated = peers.len() - added, "pool upsert");
        Ok(added)
    }

    /// Counts one more use for each handle within `key` only.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store update fails.
    pub async fn increment_usage(&self, handles: &[Handle], key: &PoolKey) -> Result<u64, DbError> {
        if handles.is_empty() {
            return Ok(0);
        }
        let mut unique = handles.to_vec();
        unique.sort();
        unique.dedup();
        self.store
            .increment_pool_usage(&key.to_string(), &unique)
            .await
    }

    /// Soft-deletes one entry; it stays until [`PeerPool::cleanup_invalid`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store update fails.
    pub async fn mark_invalid(&self, handle: &Handle, key: &PoolKey) -> Result<bool, DbError> {
        let pool_key = key.to_string();
        let matched = self.store.mark_pool_entry_invalid(&pool_key, handle).await?;
        if matched {
            tracing::info!(peer = %handle, pool_key = %pool_key, "marked pool entry invalid");
        }
        Ok(matched)
    }

    /// Removes entries last validated more than `days_old` days ago.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store delete fails.
    pub async fn cleanup_stale(&self, days_old: i64) -> Result<u64, DbError> {
        let cutoff = self.clock.now() - Duration::days(days_old);
        let removed = self.store.delete_stale_pool_entries(cutoff).await?;
        tracing::info!(days_old, removed, "pool stale cleanup");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the store delete fails.
    pub async fn cleanup_invalid(&self) -> Result<u64, DbError> {
        let removed = self.store.delete_invalid_pool_entries().await?;
        tracing::info!(removed, "pool invalid cleanup");
        Ok(removed)
    }

    /// Pool health, across all pools or for one key. The per-niche breakdown
    /// is only filled in for the unscoped view.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a store read fails.
    pub async fn stats(&self, key: Option<&PoolKey>) -> Result<PoolStats, DbError> {
        let pool_key = key.map(ToString::to_string);
        let scope = pool_key.as_deref();
        let cutoff = self.clock.now() - Duration::days(self.settings.validation_days);

        let counts = self.store.pool_counts(scope, cutoff).await?;
        let most_used = self.store.most_used_pool_entries(scope, TOP_USED).await?;
        let by_niche = if scope.is_none() {
            self.store.pool_niche_counts().await?
        } else {
            std::collections::BTreeMap::new()
        };

        Ok(PoolStats {
            total: counts.total,
            valid: counts.valid,
            stale: counts.stale,
            invalid: counts.invalid,
            most_used,
            by_niche,
        })
    }

    /// Checks that the account still resolves. A failed lookup marks the
    /// entry invalid and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if marking the entry invalid fails.
    pub async fn validate_peer(
        &self,
        ctx: &RunContext,
        social: &dyn SocialDataSource,
        handle: &Handle,
        key: &PoolKey,
    ) -> Result<bool, DbError> {
        match social.user_by_handle(ctx, handle).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(peer = %handle, error = %e, "peer validation failed");
                self.mark_invalid(handle, key).await?;
                Ok(false)
            }
        }
    }
}

fn average_followers(peers: &[PeerRecord]) -> u64 {
    let total: u128 = peers.iter().map(|p| u128::from(p.followers)).sum();
    let average = total / peers.len().max(1) as u128;
    u64::try_from(average).unwrap_or(u64::MAX)
}
