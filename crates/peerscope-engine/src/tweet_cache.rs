//! Per-account TTL cache of fetched posts.
//!
//! Writes append a new entry per fetch so the history of fetches is kept;
//! reads take the newest entry still inside the TTL. Lookups go through
//! [`Handle`], so case and a leading `@` never cause a miss.

use std::sync::Arc;

use chrono::Duration;
use peerscope_core::{Handle, Post};
use peerscope_db::DbError;
use serde::Serialize;

use crate::clock::Clock;
use crate::store::AnalysisStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TweetCacheStats {
    pub total: u64,
    pub fresh: u64,
    pub stale: u64,
    pub ttl_hours: i64,
}

#[derive(Clone)]
pub struct TweetCache {
    store: Arc<dyn AnalysisStore>,
    clock: Arc<dyn Clock>,
    ttl_hours: i64,
}

impl TweetCache {
    #[must_use]
    pub fn new(store: Arc<dyn AnalysisStore>, clock: Arc<dyn Clock>, ttl_hours: i64) -> Self {
        Self {
            store,
            clock,
            ttl_hours,
        }
    }

    #[must_use]
    pub fn ttl_hours(&self) -> i64 {
        self.ttl_hours
    }

    /// Posts from the newest entry younger than the TTL, or `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store read fails.
    pub async fn get(&self, handle: &Handle) -> Result<Option<Vec<Post>>, DbError> {
        let cutoff = self.clock.now() - Duration::hours(self.ttl_hours);
        match self.store.latest_tweets_since(handle, cutoff).await? {
            Some(entry) => {
                tracing::info!(
                    handle = %handle,
                    posts = entry.posts.len(),
                    fetched_at = %entry.fetched_at,
                    "tweet cache hit"
                );
                Ok(Some(entry.posts))
            }
            None => {
                tracing::info!(handle = %handle, "tweet cache miss");
                Ok(None)
            }
        }
    }

    /// Appends a fetch. Earlier entries are kept.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store write fails.
    pub async fn put(&self, handle: &Handle, posts: &[Post]) -> Result<(), DbError> {
        self.store
            .append_tweets(handle, posts, self.clock.now())
            .await?;
        tracing::debug!(handle = %handle, posts = posts.len(), "cached posts");
        Ok(())
    }

    /// Drops every entry for `handle`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store delete fails.
    pub async fn invalidate(&self, handle: &Handle) -> Result<u64, DbError> {
        let removed = self.store.delete_tweets_for_handle(handle).await?;
        tracing::info!(handle = %handle, removed, "invalidated tweet cache");
        Ok(removed)
    }

    /// Deletes entries fetched more than `older_than_days` ago.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store delete fails.
    pub async fn cleanup(&self, older_than_days: i64) -> Result<u64, DbError> {
        let cutoff = self.clock.now() - Duration::days(older_than_days);
        let removed = self.store.delete_tweets_before(cutoff).await?;
        tracing::info!(older_than_days, removed, "tweet cache cleanup");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the store read fails.
    pub async fn stats(&self) -> Result<TweetCacheStats, DbError> {
        let cutoff = self.clock.now() - Duration::hours(self.ttl_hours);
        let counts = self.store.tweet_counts(cutoff).await?;
        Ok(TweetCacheStats {
            total: counts.total,
            fresh: counts.fresh,
            stale: counts.total.saturating_sub(counts.fresh),
            ttl_hours: self.ttl_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            text: format!("post {id}"),
            created_at: None,
            like_count: 0,
            retweet_count: 0,
            reply_count: 0,
            quote_count: 0,
            view_count: None,
        }
    }

    fn setup() -> (TweetCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        ));
        let cache = TweetCache::new(Arc::new(MemoryStore::new()), clock.clone(), 6);
        (cache, clock)
    }

    #[tokio::test]
    async fn entry_expires_exactly_at_ttl_boundary() {
        let (cache, clock) = setup();
        let handle = Handle::parse("alice").unwrap();
        cache.put(&handle, &[post("1")]).await.unwrap();

        clock.advance(Duration::hours(6) - Duration::seconds(1));
        assert!(cache.get(&handle).await.unwrap().is_some());

        clock.advance(Duration::seconds(2));
        assert!(cache.get(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn newest_entry_wins_and_history_is_kept() {
        let (cache, clock) = setup();
        let handle = Handle::parse("alice").unwrap();
        cache.put(&handle, &[post("old")]).await.unwrap();
        clock.advance(Duration::minutes(10));
        cache.put(&handle, &[post("new")]).await.unwrap();

        let posts = cache.get(&handle).await.unwrap().unwrap();
        assert_eq!(posts[0].id, "new");
        assert_eq!(cache.stats().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn lookups_ignore_case_and_sigil() {
        let (cache, _clock) = setup();
        cache
            .put(&Handle::parse("@Alice").unwrap(), &[post("1")])
            .await
            .unwrap();
        assert!(cache
            .get(&Handle::parse("ALICE").unwrap())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn invalidate_drops_only_that_handle() {
        let (cache, _clock) = setup();
        let alice = Handle::parse("alice").unwrap();
        let bob = Handle::parse("bob").unwrap();
        cache.put(&alice, &[post("1")]).await.unwrap();
        cache.put(&bob, &[post("2")]).await.unwrap();

        assert_eq!(cache.invalidate(&alice).await.unwrap(), 1);
        assert!(cache.get(&alice).await.unwrap().is_none());
        assert!(cache.get(&bob).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_and_stats_split_fresh_from_stale() {
        let (cache, clock) = setup();
        let handle = Handle::parse("alice").unwrap();
        cache.put(&handle, &[post("1")]).await.unwrap();
        clock.advance(Duration::days(3));
        cache.put(&handle, &[post("2")]).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.ttl_hours, 6);

        assert_eq!(cache.cleanup(2).await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap().total, 1);
    }
}
