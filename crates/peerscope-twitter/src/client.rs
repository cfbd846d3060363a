//! HTTP client for twitterapi.io.

use std::time::Duration;

use async_trait::async_trait;
use peerscope_core::{
    AccountSnapshot, AppConfig, CostEvent, ExternalError, Handle, Post, RunContext,
    SocialDataSource,
};
use peerscope_http::{AuthHeader, Backoff, ExternalCallClient, RetryPolicy};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{ApiTweet, LastTweetsResponse, UserInfoResponse};

pub const TARGET: &str = "twitterapi";
pub const DEFAULT_BASE_URL: &str = "https://api.twitterapi.io";
/// The `last_tweets` endpoint returns at most this many items per call.
pub const MAX_POSTS_PER_CALL: usize = 100;

/// Client for twitterapi.io. Authenticates with the `X-API-Key` header.
#[derive(Debug, Clone)]
pub struct TwitterApiClient {
    http: ExternalCallClient,
}

impl TwitterApiClient {
    /// Builds a client against `base_url` with an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] if `base_url` is not a valid URL.
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ExternalError> {
        let http = ExternalCallClient::new(
            TARGET,
            base_url,
            AuthHeader::ApiKey {
                header: "X-API-Key".to_string(),
                value: api_key.to_string(),
            },
            timeout,
            policy,
        )?;
        Ok(Self { http })
    }

    /// Builds a client from application config.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] if `TWITTERAPI_KEY` is not set or
    /// the base URL is invalid.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ExternalError> {
        let api_key = config.twitter_api_key.as_deref().ok_or_else(|| {
            ExternalError::Validation("TWITTERAPI_KEY is not set".to_string())
        })?;
        Self::new(
            api_key,
            &config.twitter_base_url,
            Duration::from_secs(config.twitter_timeout_secs),
            Self::retry_policy(config),
        )
    }

    /// Fixed back-off on 429 and a pause after every success: the API
    /// enforces a hard per-second quota.
    #[must_use]
    pub fn retry_policy(config: &AppConfig) -> RetryPolicy {
        RetryPolicy {
            max_retries: config.max_retries,
            rate_limit_backoff: Backoff::Fixed(Duration::from_secs(
                config.twitter_rate_limit_backoff_secs,
            )),
            timeout_delay: Duration::from_secs(config.timeout_retry_delay_secs),
            courtesy_delay: Some(Duration::from_millis(config.twitter_courtesy_delay_ms))
                .filter(|d| !d.is_zero()),
        }
    }
}

#[async_trait]
impl SocialDataSource for TwitterApiClient {
    async fn user_by_handle(
        &self,
        ctx: &RunContext,
        handle: &Handle,
    ) -> Result<AccountSnapshot, ExternalError> {
        tracing::info!(handle = %handle, "fetching account");
        let body = self
            .http
            .get_json("/twitter/user/info", &[("userName", handle.to_string())])
            .await?;
        ctx.record_cost(CostEvent::UserInfo);

        let response: UserInfoResponse = decode(body, "user info")?;
        let Some(user) = response.data else {
            return Err(ExternalError::NotFound {
                target: TARGET.to_string(),
                resource: format!("account @{handle}"),
            });
        };

        let (Some(external_id), Some(user_name)) = (user.id, user.user_name) else {
            return Err(ExternalError::MalformedResponse {
                snippet: String::new(),
                reason: format!("user info for @{handle} lacks id or userName"),
            });
        };
        let returned = Handle::parse(&user_name).map_err(|e| ExternalError::MalformedResponse {
            snippet: user_name.clone(),
            reason: e.to_string(),
        })?;

        Ok(AccountSnapshot {
            external_id: Some(external_id),
            handle: returned,
            name: user.name,
            description: user.description,
            profile_image_url: user.profile_picture,
            followers: user.followers,
            following: user.following,
            post_count: user.statuses_count,
        })
    }

    async fn recent_posts(
        &self,
        ctx: &RunContext,
        handle: &Handle,
        max_results: usize,
    ) -> Result<Vec<Post>, ExternalError> {
        let count = max_results.clamp(1, MAX_POSTS_PER_CALL);
        let body = self
            .http
            .get_json(
                "/twitter/user/last_tweets",
                &[
                    ("userName", handle.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;

        let response: LastTweetsResponse = decode(body, "last tweets")?;
        let Some(raw) = response.data.and_then(|d| d.tweets) else {
            tracing::warn!(handle = %handle, "last_tweets response has no tweets array");
            return Ok(Vec::new());
        };

        // Billed on what the API returned, before filtering.
        ctx.record_cost(CostEvent::Posts {
            count: raw.len() as u64,
        });

        let total = raw.len();
        let posts: Vec<Post> = raw
            .into_iter()
            .filter(ApiTweet::is_original)
            .filter_map(into_post)
            .take(max_results)
            .collect();

        tracing::info!(
            handle = %handle,
            original = posts.len(),
            total,
            "fetched recent posts"
        );
        Ok(posts)
    }
}

fn into_post(tweet: ApiTweet) -> Option<Post> {
    Some(Post {
        id: tweet.id?,
        text: tweet.text,
        created_at: tweet.created_at,
        like_count: tweet.like_count,
        retweet_count: tweet.retweet_count,
        reply_count: tweet.reply_count,
        quote_count: tweet.quote_count,
        view_count: tweet.view_count,
    })
}

fn decode<T: DeserializeOwned>(body: Value, context: &str) -> Result<T, ExternalError> {
    serde_json::from_value(body.clone()).map_err(|e| ExternalError::MalformedResponse {
        snippet: peerscope_http::truncate_for_log(&body.to_string(), 500),
        reason: format!("{context}: {e}"),
    })
}
