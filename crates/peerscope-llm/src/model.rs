//! [`GrowthModel`] backed by Grok.

use async_trait::async_trait;
use peerscope_core::{
    AccountSnapshot, AppConfig, DerivedProfile, ExternalError, GrowthModel, PeerRecord, Post,
    Report, RunContext,
};
use serde_json::Value;

use crate::client::GrokClient;
use crate::prompts;

/// Deterministic output for profiling and peer matching.
const EXTRACTION_TEMPERATURE: f64 = 0.0;
/// Slightly looser for the written report.
const INSIGHTS_TEMPERATURE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct GrokGrowthModel {
    client: GrokClient,
}

impl GrokGrowthModel {
    #[must_use]
    pub fn new(client: GrokClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// See [`GrokClient::from_app_config`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ExternalError> {
        GrokClient::from_app_config(config).map(Self::new)
    }
}

#[async_trait]
impl GrowthModel for GrokGrowthModel {
    async fn profile(
        &self,
        ctx: &RunContext,
        account: &AccountSnapshot,
        posts: Option<&[Post]>,
    ) -> Result<DerivedProfile, ExternalError> {
        let messages = match posts {
            Some(posts) => {
                tracing::info!(handle = %account.handle, posts = posts.len(), "profiling from posts");
                prompts::profile_with_posts(account, posts)
            }
            None => {
                tracing::info!(handle = %account.handle, "profiling by handle only");
                prompts::profile_handle_only(account)
            }
        };

        let value = self
            .client
            .complete_json(ctx, &messages, EXTRACTION_TEMPERATURE)
            .await?;
        let profile = DerivedProfile::from_value(value)?;
        tracing::info!(
            handle = %account.handle,
            niche = %profile.primary_niche,
            "profile complete"
        );
        Ok(profile)
    }

    async fn find_peers(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        count: usize,
    ) -> Result<Vec<PeerRecord>, ExternalError> {
        let followers = profile.followers.unwrap_or(0);
        let messages = prompts::find_peers(profile, followers, count);
        let value = self
            .client
            .complete_json(ctx, &messages, EXTRACTION_TEMPERATURE)
            .await?;
        let peers = parse_peers(value, count)?;
        tracing::info!(handle = %profile.handle, peers = peers.len(), "peer matching complete");
        Ok(peers)
    }

    async fn generate_insights(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        peers: &[PeerRecord],
    ) -> Result<Report, ExternalError> {
        let messages = prompts::generate_insights(profile, peers);
        let value = self
            .client
            .complete_json(ctx, &messages, INSIGHTS_TEMPERATURE)
            .await?;
        let report = Report::from_value(value)?;
        tracing::info!(
            handle = %profile.handle,
            insights = report.insights.len(),
            growth_score = report.score(),
            "insights generated"
        );
        Ok(report)
    }
}

/// Parses `{"peers": [...]}`, best match first, at most `count`.
/// Elements without a usable handle are skipped.
fn parse_peers(value: Value, count: usize) -> Result<Vec<PeerRecord>, ExternalError> {
    let raw = match value {
        Value::Object(mut map) => match map.remove("peers") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut peers: Vec<PeerRecord> = raw
        .into_iter()
        .filter_map(|item| match PeerRecord::from_value(item) {
            Ok(peer) => Some(peer),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unusable peer suggestion");
                None
            }
        })
        .collect();

    if peers.is_empty() {
        return Err(ExternalError::Validation(
            "model returned no peer suggestions".to_string(),
        ));
    }

    peers.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    peers.truncate(count);
    Ok(peers)
}
