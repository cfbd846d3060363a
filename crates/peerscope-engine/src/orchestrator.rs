//! One full analysis run: profile, peers, report, persisted record.
//!
//! Peers are resolved from the cheapest source that can satisfy the request:
//! the user's unexpired assignments, then the shared pool, then a fresh
//! discovery call. The report is always generated fresh. External failures
//! abort the run before anything is recorded as an analysis; bookkeeping
//! writes (usage counters, assignments, pool inserts) only log on failure.

use std::sync::Arc;

use chrono::Duration;
use peerscope_core::{
    AppConfig, CoreError, CostSummary, GrowthModel, Handle, PeerRecord, PoolKey, ProfileRecord,
    Report, RunContext, SocialDataSource,
};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::peer_pool::{PeerPool, PeerPoolSettings};
use crate::profile_cache::{ProfileCache, ProfileCacheSettings};
use crate::store::{AnalysisRecord, AnalysisStore, NewAnalysisRecord};
use crate::tweet_cache::TweetCache;

/// Where a run's peers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSource {
    Assignments,
    Pool,
    Discovery,
    /// Pool peers topped up by a discovery call.
    Mixed,
}

impl PeerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PeerSource::Assignments => "assignments",
            PeerSource::Pool => "pool",
            PeerSource::Discovery => "discovery",
            PeerSource::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for PeerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub peer_count: usize,
    /// Fewer unexpired assignments than this counts as an assignment miss.
    pub min_cached_peers: usize,
    pub peer_match_ttl_hours: i64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            peer_count: 5,
            min_cached_peers: 5,
            peer_match_ttl_hours: 24,
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            peer_count: config.peer_count,
            min_cached_peers: config.min_cached_peers,
            peer_match_ttl_hours: config.peer_match_ttl_hours,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub profile: ProfileRecord,
    pub peers: Vec<PeerRecord>,
    pub peer_source: PeerSource,
    pub report: Report,
    pub analysis: AnalysisRecord,
    pub cost: CostSummary,
}

pub struct AnalysisOrchestrator {
    store: Arc<dyn AnalysisStore>,
    clock: Arc<dyn Clock>,
    model: Arc<dyn GrowthModel>,
    profiles: ProfileCache,
    pool: PeerPool,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        clock: Arc<dyn Clock>,
        model: Arc<dyn GrowthModel>,
        profiles: ProfileCache,
        pool: PeerPool,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            clock,
            model,
            profiles,
            pool,
            settings,
        }
    }

    /// Wires every component from configuration.
    #[must_use]
    pub fn from_app_config(
        config: &AppConfig,
        store: Arc<dyn AnalysisStore>,
        clock: Arc<dyn Clock>,
        social: Arc<dyn SocialDataSource>,
        model: Arc<dyn GrowthModel>,
    ) -> Self {
        let tweets = TweetCache::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.tweet_cache_ttl_hours,
        );
        let profiles = ProfileCache::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            social,
            Arc::clone(&model),
            tweets,
            ProfileCacheSettings::from_app_config(config),
        );
        let pool = PeerPool::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            PeerPoolSettings::from_app_config(config),
        );
        Self::new(
            store,
            clock,
            model,
            profiles,
            pool,
            OrchestratorSettings::from_app_config(config),
        )
    }

    #[must_use]
    pub fn pool(&self) -> &PeerPool {
        &self.pool
    }

    /// Runs a complete analysis for one user and records it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UserNotFound`] if no user has that id.
    /// - [`EngineError::External`] with the original failure kind if profiling,
    ///   peer discovery or report generation fails. No analysis is recorded.
    /// - [`EngineError::Db`] if the profile or analysis cannot be stored.
    pub async fn run_full_analysis(
        &self,
        user_id: i64,
        refresh_profile: bool,
        refresh_peers: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))?;
        let ctx = RunContext::new(user.id, user.handle.clone());
        tracing::info!(
            user_id,
            handle = %user.handle,
            refresh_profile,
            refresh_peers,
            "starting analysis"
        );

        let profile = self.profiles.get_or_create(&ctx, refresh_profile).await?;
        let (peers, peer_source) = self.resolve_peers(&ctx, &profile, refresh_peers).await?;

        let report = self
            .model
            .generate_insights(&ctx, &profile.derived, &peers)
            .await?;

        let cost = ctx.cost_summary();
        let created_at = self.clock.now();
        let analysis = self
            .store
            .insert_analysis(&NewAnalysisRecord {
                user_id,
                profile_id: Some(profile.id),
                growth_score: report.score(),
                report: serde_json::to_value(&report).map_err(CoreError::from)?,
                peer_handles: peers.iter().map(|p| p.handle.to_string()).collect(),
                peer_source: peer_source.to_string(),
                cost_summary: serde_json::to_value(&cost).map_err(CoreError::from)?,
                created_at,
            })
            .await?;

        if let Err(e) = self.store.touch_last_analysis(user_id, created_at).await {
            tracing::warn!(user_id, error = %e, "failed to record last analysis time");
        }

        tracing::info!(
            user_id,
            handle = %user.handle,
            analysis_id = %analysis.public_id,
            growth_score = report.score(),
            peer_source = %peer_source,
            peers = peers.len(),
            total_cost_usd = %cost.total_cost_usd,
            "analysis complete"
        );

        Ok(AnalysisOutcome {
            profile,
            peers,
            peer_source,
            report,
            analysis,
            cost,
        })
    }

    /// Keeps the cached profile and forces a new peer set.
    ///
    /// # Errors
    ///
    /// Same as [`AnalysisOrchestrator::run_full_analysis`].
    pub async fn refresh_peers_only(&self, user_id: i64) -> Result<AnalysisOutcome, EngineError> {
        self.run_full_analysis(user_id, false, true).await
    }

    async fn resolve_peers(
        &self,
        ctx: &RunContext,
        profile: &ProfileRecord,
        refresh: bool,
    ) -> Result<(Vec<PeerRecord>, PeerSource), EngineError> {
        let count = self.settings.peer_count;
        let key = PoolKey::new(&profile.niche, profile.metrics.followers);

        if !refresh {
            if let Some(peers) = self.cached_assignments(ctx).await {
                return Ok((peers, PeerSource::Assignments));
            }
        }

        let pool_peers = if refresh {
            Vec::new()
        } else {
            self.pool_peers(&key, count).await
        };

        let (peers, source) = if pool_peers.len() >= count {
            (pool_peers.clone(), PeerSource::Pool)
        } else {
            let discovered = self.model.find_peers(ctx, &profile.derived, count).await?;
            if let Err(e) = self
                .pool
                .add_peers(&discovered, &profile.niche, Some(&key))
                .await
            {
                tracing::warn!(pool_key = %key, error = %e, "failed to add discovered peers to pool");
            }
            let source = if pool_peers.is_empty() {
                PeerSource::Discovery
            } else {
                PeerSource::Mixed
            };
            (merge_peers(&pool_peers, discovered, count), source)
        };

        let used: Vec<Handle> = peers
            .iter()
            .filter(|p| pool_peers.iter().any(|q| q.handle == p.handle))
            .map(|p| p.handle.clone())
            .collect();
        if let Err(e) = self.pool.increment_usage(&used, &key).await {
            tracing::warn!(pool_key = %key, error = %e, "failed to increment pool usage");
        }

        let now = self.clock.now();
        let expires_at = now + Duration::hours(self.settings.peer_match_ttl_hours);
        if let Err(e) = self
            .store
            .replace_peer_assignments(ctx.user_id(), &peers, now, expires_at)
            .await
        {
            tracing::warn!(user_id = ctx.user_id(), error = %e, "failed to store peer assignments");
        }

        Ok((peers, source))
    }

    /// Unexpired assignments, or `None` when there are too few to use.
    async fn cached_assignments(&self, ctx: &RunContext) -> Option<Vec<PeerRecord>> {
        let now = self.clock.now();
        let limit = self.settings.peer_count.max(self.settings.min_cached_peers);
        match self
            .store
            .fresh_peer_assignments(ctx.user_id(), now, limit)
            .await
        {
            Ok(peers) if !peers.is_empty() && peers.len() >= self.settings.min_cached_peers => {
                tracing::info!(handle = %ctx.handle(), peers = peers.len(), "peer assignments hit");
                Some(peers.into_iter().take(self.settings.peer_count).collect())
            }
            Ok(peers) => {
                tracing::info!(
                    handle = %ctx.handle(),
                    peers = peers.len(),
                    "peer assignments miss"
                );
                None
            }
            Err(e) => {
                tracing::warn!(handle = %ctx.handle(), error = %e, "peer assignment lookup failed");
                None
            }
        }
    }

    /// Pool peers with a decodable snapshot. A failed read counts as a miss.
    async fn pool_peers(&self, key: &PoolKey, count: usize) -> Vec<PeerRecord> {
        let entries = match self.pool.get_peer_entries(key, count, true).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(pool_key = %key, error = %e, "pool lookup failed");
                return Vec::new();
            }
        };
        entries
            .iter()
            .filter_map(|entry| {
                let peer = entry.peer_record();
                if peer.is_none() {
                    tracing::warn!(
                        peer = %entry.handle,
                        pool_key = %key,
                        "skipping pool entry without a usable snapshot"
                    );
                }
                peer
            })
            .collect()
    }
}

/// Pool peers first, then discovered peers not already present, cut to `count`.
fn merge_peers(pool: &[PeerRecord], discovered: Vec<PeerRecord>, count: usize) -> Vec<PeerRecord> {
    let mut merged: Vec<PeerRecord> = pool.to_vec();
    for peer in discovered {
        if !merged.iter().any(|p| p.handle == peer.handle) {
            merged.push(peer);
        }
    }
    merged.truncate(count);
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn peer(handle: &str) -> PeerRecord {
        PeerRecord::from_value(json!({"handle": handle})).unwrap()
    }

    fn handles(peers: &[PeerRecord]) -> Vec<&str> {
        peers.iter().map(|p| p.handle.as_str()).collect()
    }

    #[test]
    fn merge_puts_pool_first_and_skips_duplicates() {
        let pool = vec![peer("a"), peer("b")];
        let discovered = vec![peer("b"), peer("c"), peer("d"), peer("e"), peer("f")];
        let merged = merge_peers(&pool, discovered, 5);
        assert_eq!(handles(&merged), ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn merge_never_exceeds_count() {
        let merged = merge_peers(&[], vec![peer("a"), peer("b"), peer("c")], 2);
        assert_eq!(handles(&merged), ["a", "b"]);
    }

    #[test]
    fn peer_source_names_are_stable() {
        assert_eq!(PeerSource::Mixed.to_string(), "mixed");
        assert_eq!(
            serde_json::to_value(PeerSource::Assignments).unwrap(),
            json!("assignments")
        );
    }
}
