//! Scripted collaborators and a wired-up engine over the in-memory store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use peerscope_core::{
    AccountSnapshot, CostEvent, DerivedProfile, ExternalError, GrowthModel, Handle, PeerRecord,
    Post, Report, RunContext, SocialDataSource,
};
use peerscope_engine::{
    AnalysisOrchestrator, AnalysisStore, ManualClock, MemoryStore, OrchestratorSettings,
    PeerPool, PeerPoolSettings, ProfileCache, ProfileCacheSettings, TweetCache,
};
use serde_json::json;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap()
}

pub fn handle(raw: &str) -> Handle {
    Handle::parse(raw).unwrap()
}

pub fn peer(raw: &str, followers: u64, score: f64) -> PeerRecord {
    PeerRecord::from_value(json!({
        "handle": raw,
        "followers": followers,
        "primary_niche": "Personal finance",
        "estimated_monthly_growth_percent": 9.5,
        "match_score": score,
        "match_reason": "same audience",
        "growth_edge": "daily threads"
    }))
    .unwrap()
}

pub fn sample_post(id: usize) -> Post {
    Post {
        id: id.to_string(),
        text: format!("post number {id}"),
        created_at: None,
        like_count: 10,
        retweet_count: 1,
        reply_count: 2,
        quote_count: 0,
        view_count: Some(400),
    }
}

// ---------------------------------------------------------------------------
// Social source
// ---------------------------------------------------------------------------

pub struct FakeSocial {
    followers: HashMap<String, u64>,
    pub user_calls: AtomicU32,
    pub post_calls: AtomicU32,
    pub last_post_limit: AtomicUsize,
}

impl FakeSocial {
    pub fn new(accounts: &[(&str, u64)]) -> Self {
        Self {
            followers: accounts
                .iter()
                .map(|(h, f)| ((*h).to_string(), *f))
                .collect(),
            user_calls: AtomicU32::new(0),
            post_calls: AtomicU32::new(0),
            last_post_limit: AtomicUsize::new(0),
        }
    }

    pub fn user_calls(&self) -> u32 {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn post_calls(&self) -> u32 {
        self.post_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialDataSource for FakeSocial {
    async fn user_by_handle(
        &self,
        ctx: &RunContext,
        handle: &Handle,
    ) -> Result<AccountSnapshot, ExternalError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let followers =
            *self
                .followers
                .get(handle.as_str())
                .ok_or_else(|| ExternalError::NotFound {
                    target: "fake".to_string(),
                    resource: format!("user {handle}"),
                })?;
        ctx.record_cost(CostEvent::UserInfo);
        Ok(AccountSnapshot {
            external_id: Some(format!("id-{handle}")),
            handle: handle.clone(),
            name: None,
            description: None,
            profile_image_url: None,
            followers,
            following: 250,
            post_count: 3_000,
        })
    }

    async fn recent_posts(
        &self,
        ctx: &RunContext,
        _handle: &Handle,
        max_results: usize,
    ) -> Result<Vec<Post>, ExternalError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        self.last_post_limit.store(max_results, Ordering::SeqCst);
        let posts: Vec<Post> = (0..max_results).map(sample_post).collect();
        ctx.record_cost(CostEvent::Posts {
            count: posts.len() as u64,
        });
        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// Growth model
// ---------------------------------------------------------------------------

pub struct FakeModel {
    niche: String,
    peers: Mutex<Vec<PeerRecord>>,
    peer_failure: Mutex<Option<ExternalError>>,
    insight_failure: Mutex<Option<ExternalError>>,
    /// Post count passed to each `profile` call; `None` for handle-only.
    pub profile_inputs: Mutex<Vec<Option<usize>>>,
    pub peer_calls: AtomicU32,
    pub insight_peer_counts: Mutex<Vec<usize>>,
    /// `profile.followers` as seen by `find_peers` and `generate_insights`.
    pub peer_request_followers: Mutex<Vec<Option<u64>>>,
    pub insight_request_followers: Mutex<Vec<Option<u64>>>,
}

impl FakeModel {
    pub fn new(niche: &str) -> Self {
        Self {
            niche: niche.to_string(),
            peers: Mutex::new(Vec::new()),
            peer_failure: Mutex::new(None),
            insight_failure: Mutex::new(None),
            profile_inputs: Mutex::new(Vec::new()),
            peer_calls: AtomicU32::new(0),
            insight_peer_counts: Mutex::new(Vec::new()),
            peer_request_followers: Mutex::new(Vec::new()),
            insight_request_followers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_peers(&self, peers: Vec<PeerRecord>) {
        *self.peers.lock().unwrap() = peers;
    }

    pub fn fail_peers_with(&self, err: ExternalError) {
        *self.peer_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_insights_with(&self, err: ExternalError) {
        *self.insight_failure.lock().unwrap() = Some(err);
    }

    pub fn peer_calls(&self) -> u32 {
        self.peer_calls.load(Ordering::SeqCst)
    }

    pub fn profile_inputs(&self) -> Vec<Option<usize>> {
        self.profile_inputs.lock().unwrap().clone()
    }

    pub fn peer_request_followers(&self) -> Vec<Option<u64>> {
        self.peer_request_followers.lock().unwrap().clone()
    }

    pub fn insight_request_followers(&self) -> Vec<Option<u64>> {
        self.insight_request_followers.lock().unwrap().clone()
    }
}

fn complete_report() -> serde_json::Value {
    json!({
        "growth_score": 6.0,
        "posting_analysis": {"gap": "posts less often"},
        "content_analysis": {"gap": "fewer visuals"},
        "topic_analysis": {"gap": "narrow"},
        "structure_analysis": {"gap": "no hooks"},
        "insights": [{"title": "Post daily", "priority": "critical"}],
        "quick_wins": ["pin a thread"]
    })
}

#[async_trait]
impl GrowthModel for FakeModel {
    async fn profile(
        &self,
        ctx: &RunContext,
        account: &AccountSnapshot,
        posts: Option<&[Post]>,
    ) -> Result<DerivedProfile, ExternalError> {
        self.profile_inputs
            .lock()
            .unwrap()
            .push(posts.map(<[Post]>::len));
        ctx.record_cost(CostEvent::LanguageModel {
            input_tokens: 1_000,
            output_tokens: 400,
        });
        // Like a real model, the reply does not echo the follower count.
        Ok(DerivedProfile::from_value(json!({
            "handle": account.handle.as_str(),
            "primary_niche": self.niche,
            "average_likes_per_post": 25
        }))?)
    }

    async fn find_peers(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        count: usize,
    ) -> Result<Vec<PeerRecord>, ExternalError> {
        self.peer_calls.fetch_add(1, Ordering::SeqCst);
        self.peer_request_followers
            .lock()
            .unwrap()
            .push(profile.followers);
        if let Some(err) = self.peer_failure.lock().unwrap().clone() {
            return Err(err);
        }
        ctx.record_cost(CostEvent::LanguageModel {
            input_tokens: 800,
            output_tokens: 1_500,
        });
        let mut peers = self.peers.lock().unwrap().clone();
        if peers.is_empty() {
            return Err(ExternalError::Validation("no peers returned".to_string()));
        }
        peers.truncate(count);
        Ok(peers)
    }

    async fn generate_insights(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        peers: &[PeerRecord],
    ) -> Result<Report, ExternalError> {
        self.insight_peer_counts.lock().unwrap().push(peers.len());
        self.insight_request_followers
            .lock()
            .unwrap()
            .push(profile.followers);
        if let Some(err) = self.insight_failure.lock().unwrap().clone() {
            return Err(err);
        }
        ctx.record_cost(CostEvent::LanguageModel {
            input_tokens: 2_000,
            output_tokens: 1_000,
        });
        Ok(Report::from_value(complete_report())?)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub social: Arc<FakeSocial>,
    pub model: Arc<FakeModel>,
    pub tweets: TweetCache,
    pub pool: PeerPool,
    pub orchestrator: AnalysisOrchestrator,
}

impl Harness {
    pub fn new(accounts: &[(&str, u64)], niche: &str) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let social = Arc::new(FakeSocial::new(accounts));
        let model = Arc::new(FakeModel::new(niche));

        let tweets = TweetCache::new(store.clone(), clock.clone(), 6);
        let profiles = ProfileCache::new(
            store.clone(),
            clock.clone(),
            social.clone(),
            model.clone(),
            tweets.clone(),
            ProfileCacheSettings::default(),
        );
        let pool = PeerPool::new(store.clone(), clock.clone(), PeerPoolSettings::default());
        let orchestrator = AnalysisOrchestrator::new(
            store.clone(),
            clock.clone(),
            model.clone(),
            profiles,
            pool.clone(),
            OrchestratorSettings::default(),
        );

        Self {
            store,
            clock,
            social,
            model,
            tweets,
            pool,
            orchestrator,
        }
    }

    pub async fn add_user(&self, raw: &str) -> i64 {
        self.store.upsert_user(&handle(raw), None).await.unwrap().id
    }

    pub fn context(&self, user_id: i64, raw: &str) -> RunContext {
        RunContext::new(user_id, handle(raw))
    }
}
