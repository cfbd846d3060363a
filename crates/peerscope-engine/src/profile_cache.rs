//! Per-user cached profile.
//!
//! A fresh record is returned as stored. Otherwise the account is looked up,
//! posts are gathered for accounts below the famous threshold, the growth
//! model derives a profile, and a new record is inserted. Older records stay
//! in the store as history.

use std::sync::Arc;

use chrono::Duration;
use peerscope_core::{
    AppConfig, BasicMetrics, GrowthModel, Post, ProfileRecord, RunContext, SocialDataSource,
};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::store::{AnalysisStore, NewProfileRecord};
use crate::tweet_cache::TweetCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileCacheSettings {
    pub ttl_hours: i64,
    /// Accounts at or above this many followers are profiled without posts.
    pub famous_threshold: u64,
    pub tweet_fetch_limit: usize,
}

impl Default for ProfileCacheSettings {
    fn default() -> Self {
        Self {
            ttl_hours: 6,
            famous_threshold: 100_000,
            tweet_fetch_limit: 40,
        }
    }
}

impl ProfileCacheSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ttl_hours: config.profile_ttl_hours,
            famous_threshold: config.famous_threshold,
            tweet_fetch_limit: config.tweet_fetch_limit,
        }
    }

    #[must_use]
    pub fn needs_posts(&self, followers: u64) -> bool {
        followers < self.famous_threshold
    }
}

pub struct ProfileCache {
    store: Arc<dyn AnalysisStore>,
    clock: Arc<dyn Clock>,
    social: Arc<dyn SocialDataSource>,
    model: Arc<dyn GrowthModel>,
    tweets: TweetCache,
    settings: ProfileCacheSettings,
}

impl ProfileCache {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        clock: Arc<dyn Clock>,
        social: Arc<dyn SocialDataSource>,
        model: Arc<dyn GrowthModel>,
        tweets: TweetCache,
        settings: ProfileCacheSettings,
    ) -> Self {
        Self {
            store,
            clock,
            social,
            model,
            tweets,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ProfileCacheSettings {
        &self.settings
    }

    /// Returns the user's live profile, creating one when there is none or
    /// when `force_refresh` is set.
    ///
    /// # Errors
    ///
    /// - [`EngineError::External`] if the account lookup, the post fetch or
    ///   the profiling call fails.
    /// - [`EngineError::Db`] if the store read or insert fails.
    pub async fn get_or_create(
        &self,
        ctx: &RunContext,
        force_refresh: bool,
    ) -> Result<ProfileRecord, EngineError> {
        let handle = ctx.handle();
        if !force_refresh {
            let now = self.clock.now();
            if let Some(record) = self.store.latest_fresh_profile(ctx.user_id(), now).await? {
                tracing::info!(
                    handle = %handle,
                    expires_at = %record.expires_at,
                    "profile cache hit"
                );
                return Ok(record);
            }
        }

        tracing::info!(handle = %handle, force_refresh, "creating profile");
        let account = self.social.user_by_handle(ctx, handle).await?;
        let metrics = BasicMetrics::from(&account);

        let posts = if self.settings.needs_posts(account.followers) {
            Some(self.load_posts(ctx, force_refresh).await?)
        } else {
            tracing::info!(
                handle = %handle,
                followers = account.followers,
                "famous account; profiling without posts"
            );
            None
        };

        let mut derived = self
            .model
            .profile(ctx, &account, posts.as_deref())
            .await?;
        // The measured count wins over whatever the model echoed back.
        derived.followers = Some(account.followers);
        let niche = derived.coarse_niche().to_string();
        let posts_analyzed = posts
            .as_ref()
            .map_or(0, |p| u32::try_from(p.len()).unwrap_or(u32::MAX));

        let fetched_at = self.clock.now();
        let record = self
            .store
            .insert_profile(&NewProfileRecord {
                user_id: ctx.user_id(),
                handle: handle.clone(),
                metrics,
                derived,
                niche,
                posts_analyzed,
                fetched_at,
                expires_at: fetched_at + Duration::hours(self.settings.ttl_hours),
            })
            .await?;

        tracing::info!(
            handle = %handle,
            niche = %record.niche,
            posts_analyzed,
            expires_at = %record.expires_at,
            "profile cached"
        );
        Ok(record)
    }

    /// Cached posts when fresh and not forced, otherwise a fetch that is then
    /// written back to the tweet cache.
    async fn load_posts(
        &self,
        ctx: &RunContext,
        force_refresh: bool,
    ) -> Result<Vec<Post>, EngineError> {
        let handle = ctx.handle();
        if !force_refresh {
            if let Some(posts) = self.tweets.get(handle).await? {
                return Ok(posts);
            }
        }

        let posts = self
            .social
            .recent_posts(ctx, handle, self.settings.tweet_fetch_limit)
            .await?;
        if let Err(e) = self.tweets.put(handle, &posts).await {
            tracing::warn!(handle = %handle, error = %e, "failed to cache fetched posts");
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn famous_threshold_is_inclusive() {
        let settings = ProfileCacheSettings::default();
        assert!(settings.needs_posts(99_999));
        assert!(!settings.needs_posts(100_000));
        assert!(!settings.needs_posts(2_100_000));
    }
}
