//! Integration tests for `TwitterApiClient` using wiremock HTTP mocks.

use std::time::Duration;

use peerscope_core::{ExternalError, Handle, RunContext, SocialDataSource};
use peerscope_http::RetryPolicy;
use peerscope_twitter::TwitterApiClient;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> TwitterApiClient {
    TwitterApiClient::new(
        "test-key",
        base_url,
        Duration::from_secs(5),
        RetryPolicy::immediate(3),
    )
    .expect("client construction should not fail")
}

fn ctx() -> RunContext {
    RunContext::new(1, Handle::parse("tester").unwrap())
}

#[tokio::test]
async fn user_by_handle_returns_snapshot_and_records_cost() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/twitter/user/info"))
        .and(header("X-API-Key", "test-key"))
        .and(query_param("userName", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "id": "42",
                "userName": "Alice",
                "name": "Alice A.",
                "description": "Writes about money",
                "profilePicture": "https://img/alice.png",
                "followers": 5000,
                "following": 250,
                "statusesCount": 1200
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ctx();
    let client = test_client(&server.uri());
    let account = client
        .user_by_handle(&ctx, &Handle::parse("@Alice").unwrap())
        .await
        .expect("should parse account");

    assert_eq!(account.external_id.as_deref(), Some("42"));
    assert_eq!(account.handle.as_str(), "alice");
    assert_eq!(account.followers, 5_000);
    assert_eq!(account.following, 250);
    assert_eq!(account.post_count, 1_200);

    let summary = ctx.cost_summary();
    assert_eq!(summary.social.user_info_calls, 1);
    assert_eq!(summary.social.total_credits, 18);
}

#[tokio::test]
async fn user_by_handle_with_empty_data_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/twitter/user/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let result = test_client(&server.uri())
        .user_by_handle(&ctx(), &Handle::parse("ghost").unwrap())
        .await;
    assert!(matches!(result, Err(ExternalError::NotFound { .. })), "got: {result:?}");
}

#[tokio::test]
async fn user_by_handle_404_is_not_found_without_cost() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ctx();
    let result = test_client(&server.uri())
        .user_by_handle(&ctx, &Handle::parse("ghost").unwrap())
        .await;
    assert!(matches!(result, Err(ExternalError::NotFound { .. })));
    assert_eq!(ctx.ledger().social_credits(), 0);
}

#[tokio::test]
async fn user_by_handle_without_id_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"userName": "x"}})),
        )
        .mount(&server)
        .await;

    let result = test_client(&server.uri())
        .user_by_handle(&ctx(), &Handle::parse("x").unwrap())
        .await;
    assert!(matches!(result, Err(ExternalError::MalformedResponse { .. })));
}

#[tokio::test]
async fn recent_posts_filters_retweets_and_replies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/twitter/user/last_tweets"))
        .and(query_param("userName", "alice"))
        .and(query_param("count", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "tweets": [
                    {"id": "1", "type": "tweet", "text": "original", "likeCount": 10, "createdAt": "Tue Dec 10 07:00:30 +0000 2024"},
                    {"id": "2", "type": "retweet", "text": "RT someone"},
                    {"id": "3", "type": "tweet", "text": "@bob thanks", "isReply": true},
                    {"id": "4", "type": "tweet", "text": "quoted", "retweeted_tweet": {"id": "99"}},
                    {"id": "5", "type": "tweet", "text": "another", "retweetCount": 3}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ctx();
    let posts = test_client(&server.uri())
        .recent_posts(&ctx, &Handle::parse("alice").unwrap(), 40)
        .await
        .expect("should parse posts");

    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "5"]);
    assert_eq!(posts[0].like_count, 10);
    assert_eq!(posts[1].retweet_count, 3);

    // 5 raw items billed at 15 credits each (75), before filtering.
    let summary = ctx.cost_summary();
    assert_eq!(summary.social.posts_calls, 1);
    assert_eq!(summary.social.total_credits, 75);
}

#[tokio::test]
async fn recent_posts_caps_count_at_one_hundred() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/twitter/user/last_tweets"))
        .and(query_param("count", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"tweets": []}})))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ctx();
    let posts = test_client(&server.uri())
        .recent_posts(&ctx, &Handle::parse("alice").unwrap(), 500)
        .await
        .expect("should parse posts");
    assert!(posts.is_empty());
    // Minimum charge applies to an empty page.
    assert_eq!(ctx.ledger().social_credits(), 15);
}

#[tokio::test]
async fn recent_posts_without_tweets_array_is_empty_and_unbilled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let ctx = ctx();
    let posts = test_client(&server.uri())
        .recent_posts(&ctx, &Handle::parse("alice").unwrap(), 10)
        .await
        .expect("should tolerate missing data");
    assert!(posts.is_empty());
    assert_eq!(ctx.ledger().social_credits(), 0);
}

#[tokio::test]
async fn rate_limit_is_retried_then_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let result = test_client(&server.uri())
        .user_by_handle(&ctx(), &Handle::parse("alice").unwrap())
        .await;
    assert!(matches!(
        result,
        Err(ExternalError::RateLimited { attempts: 4, .. })
    ));
}

#[tokio::test]
async fn invalid_key_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server.uri())
        .user_by_handle(&ctx(), &Handle::parse("alice").unwrap())
        .await;
    assert!(matches!(result, Err(ExternalError::Auth { .. })));
}
