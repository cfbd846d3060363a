//! End-to-end runs of the orchestrator over the in-memory store.

mod support;

use chrono::Duration;
use peerscope_core::{ErrorKind, ExternalError, PoolKey};
use peerscope_engine::{AnalysisStore, EngineError, PeerSource};
use support::{handle, peer, sample_post, t0, Harness};

fn five_peers() -> Vec<peerscope_core::PeerRecord> {
    (1..=5u32)
        .map(|i| peer(&format!("peer{i}"), 6_000 + u64::from(i) * 100, 90.0 - f64::from(i)))
        .collect()
}

// ---------------------------------------------------------------------------
// Profile resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn small_account_is_profiled_from_recent_posts_and_cached() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(h.social.post_calls(), 1);
    assert_eq!(
        h.social.last_post_limit.load(std::sync::atomic::Ordering::SeqCst),
        40
    );
    assert_eq!(h.model.profile_inputs(), vec![Some(40)]);
    assert_eq!(outcome.profile.posts_analyzed, 40);
    assert_eq!(outcome.profile.niche, "finance");
    assert_eq!(
        outcome.profile.expires_at - outcome.profile.fetched_at,
        Duration::hours(6)
    );
}

#[tokio::test]
async fn famous_account_skips_post_fetch() {
    let h = Harness::new(&[("bigname", 2_100_000)], "Technology and AI");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("bigname").await;

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(h.social.post_calls(), 0);
    assert_eq!(h.model.profile_inputs(), vec![None]);
    assert_eq!(outcome.profile.posts_analyzed, 0);
    assert_eq!(outcome.profile.niche, "tech");
}

#[tokio::test]
async fn fresh_profile_is_reused_until_it_expires() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    let first = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    h.clock.advance(Duration::hours(5));
    let second = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    assert_eq!(first.profile.id, second.profile.id);
    assert_eq!(h.social.user_calls(), 1);

    h.clock.advance(Duration::hours(2));
    let third = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    assert_ne!(third.profile.id, first.profile.id);
    assert_eq!(h.social.user_calls(), 2);
    assert_eq!(h.store.profile_history(user_id).len(), 2);
}

#[tokio::test]
async fn forced_profile_refresh_keeps_history() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    h.orchestrator
        .run_full_analysis(user_id, true, false)
        .await
        .unwrap();

    assert_eq!(h.store.profile_history(user_id).len(), 2);
    assert_eq!(h.social.post_calls(), 2);
}

#[tokio::test]
async fn cached_posts_are_used_instead_of_a_fetch() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;
    let posts: Vec<_> = (0..12).map(sample_post).collect();
    h.tweets.put(&handle("alice"), &posts).await.unwrap();

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(h.social.post_calls(), 0);
    assert_eq!(outcome.profile.posts_analyzed, 12);
}

// ---------------------------------------------------------------------------
// Peer resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_run_discovers_and_populates_pool() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(outcome.peer_source, PeerSource::Discovery);
    assert_eq!(outcome.peers.len(), 5);
    let entries = h.store.pool_entries("finance_2500-12500");
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.times_used == 0));
}

#[tokio::test]
async fn discovery_and_report_see_the_measured_follower_count() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(h.model.peer_request_followers(), vec![Some(5_000)]);
    assert_eq!(h.model.insight_request_followers(), vec![Some(5_000)]);
    let cached = &h.store.profile_history(user_id)[0];
    assert_eq!(cached.derived.followers, Some(5_000));
}

#[tokio::test]
async fn second_run_uses_assignments_without_discovery() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(second.peer_source, PeerSource::Assignments);
    assert_eq!(h.model.peer_calls(), 1);
    assert_eq!(second.peers[0].handle.as_str(), "peer1");
}

#[tokio::test]
async fn expired_assignments_fall_back_to_the_pool() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    h.clock.advance(Duration::hours(25));
    let later = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(later.peer_source, PeerSource::Pool);
    assert_eq!(h.model.peer_calls(), 1);
    let entries = h.store.pool_entries("finance_2500-12500");
    assert!(entries.iter().all(|e| e.times_used == 1));
}

#[tokio::test]
async fn another_user_in_the_same_band_is_served_from_the_pool() {
    let h = Harness::new(&[("alice", 5_000), ("bob", 5_050)], "Personal finance");
    h.model.set_peers(five_peers());
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;

    h.orchestrator.run_full_analysis(alice, false, false).await.unwrap();
    let outcome = h.orchestrator.run_full_analysis(bob, false, false).await.unwrap();

    assert_eq!(outcome.peer_source, PeerSource::Pool);
    assert_eq!(h.model.peer_calls(), 1);
}

#[tokio::test]
async fn partial_pool_is_topped_up_by_discovery() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    let key: PoolKey = "finance_2500-12500".parse().unwrap();
    let seeded = vec![
        peer("pooled1", 7_000, 80.0),
        peer("pooled2", 7_500, 70.0),
        peer("pooled3", 8_000, 60.0),
    ];
    h.pool.add_peers(&seeded, "finance", Some(&key)).await.unwrap();

    // The partial pool is returned as-is, not treated as an error.
    let from_pool = h.pool.get_peers("finance", 5_000, 5, true).await.unwrap();
    assert_eq!(from_pool.len(), 3);

    let mut discovered = five_peers();
    discovered[0] = peer("pooled2", 7_500, 99.0);
    h.model.set_peers(discovered);
    let user_id = h.add_user("alice").await;

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    assert_eq!(outcome.peer_source, PeerSource::Mixed);
    let handles: Vec<&str> = outcome.peers.iter().map(|p| p.handle.as_str()).collect();
    assert_eq!(handles, ["pooled1", "pooled2", "pooled3", "peer2", "peer3"]);

    let entries = h.store.pool_entries(&key.to_string());
    let used = |name: &str| {
        entries
            .iter()
            .find(|e| e.handle.as_str() == name)
            .map(|e| e.times_used)
    };
    assert_eq!(used("pooled1"), Some(1));
    assert_eq!(used("peer2"), Some(0));
    assert_eq!(entries.len(), 7);
}

#[tokio::test]
async fn forced_peer_refresh_bypasses_assignments_and_pool() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();
    let refreshed = h.orchestrator.refresh_peers_only(user_id).await.unwrap();

    assert_eq!(refreshed.peer_source, PeerSource::Discovery);
    assert_eq!(h.model.peer_calls(), 2);
    assert_eq!(h.social.user_calls(), 1);
}

// ---------------------------------------------------------------------------
// Report, persistence and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insights_are_regenerated_on_every_run() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    h.orchestrator.run_full_analysis(user_id, false, false).await.unwrap();
    h.orchestrator.run_full_analysis(user_id, false, false).await.unwrap();

    assert_eq!(*h.model.insight_peer_counts.lock().unwrap(), vec![5, 5]);
}

#[tokio::test]
async fn analysis_record_carries_report_peers_and_cost() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    let user_id = h.add_user("alice").await;

    let outcome = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap();

    let stored = h.store.latest_analysis(user_id).await.unwrap().unwrap();
    assert_eq!(stored.public_id, outcome.analysis.public_id);
    assert_eq!(stored.profile_id, Some(outcome.profile.id));
    assert!((stored.growth_score - 6.0).abs() < f64::EPSILON);
    assert_eq!(stored.peer_source, "discovery");
    assert_eq!(stored.peer_handles.len(), 5);
    assert_eq!(stored.cost_summary["social"]["user_info_calls"], 1);
    assert_eq!(stored.cost_summary["social"]["posts_calls"], 1);
    assert_eq!(stored.cost_summary["language_model"]["api_calls"], 3);
    assert_eq!(outcome.cost.social.total_credits, 18 + 600);

    let user = h.store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.last_analysis_at, Some(stored.created_at));
    assert_eq!(user.created_at, t0());
}

#[tokio::test]
async fn discovery_failure_aborts_without_recording_an_analysis() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.fail_peers_with(ExternalError::RateLimited {
        target: "xai".to_string(),
        attempts: 4,
    });
    let user_id = h.add_user("alice").await;

    let err = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::RateLimited));
    assert!(h.store.latest_analysis(user_id).await.unwrap().is_none());
    // The profile step had already committed and stays cached.
    assert_eq!(h.store.profile_history(user_id).len(), 1);
}

#[tokio::test]
async fn incomplete_report_is_a_validation_failure() {
    let h = Harness::new(&[("alice", 5_000)], "Personal finance");
    h.model.set_peers(five_peers());
    h.model.fail_insights_with(ExternalError::Validation(
        "report is missing required section `insights`".to_string(),
    ));
    let user_id = h.add_user("alice").await;

    let err = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert!(h.store.latest_analysis(user_id).await.unwrap().is_none());
    // Peers discovered before the failure remain in the pool.
    assert_eq!(h.store.pool_entries("finance_2500-12500").len(), 5);
}

#[tokio::test]
async fn unknown_account_surfaces_not_found() {
    let h = Harness::new(&[], "Personal finance");
    let user_id = h.add_user("ghost").await;

    let err = h
        .orchestrator
        .run_full_analysis(user_id, false, false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn unknown_user_id_is_rejected() {
    let h = Harness::new(&[], "Personal finance");
    let err = h
        .orchestrator
        .run_full_analysis(999, false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(999)));
}
