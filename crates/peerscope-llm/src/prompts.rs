//! Prompt builders. The engine treats these as opaque; only the JSON shape
//! they ask for matters to the parsers in `peerscope-core`.

use peerscope_core::{AccountSnapshot, DerivedProfile, PeerRecord, Post};
use serde_json::{json, Value};

use crate::client::ChatMessage;

/// Posts beyond this many are not sent to the model.
pub const MAX_PROMPT_POSTS: usize = 40;
/// Peers beyond this many are not summarized in the insights prompt.
pub const MAX_PROMPT_PEERS: usize = 5;

const ANALYST_ROLE: &str = "You are an expert X/Twitter growth analyst. \
Reply with a single valid JSON object only: no markdown, no commentary.";

const PROFILE_SHAPE: &str = r#"{
  "handle": "<handle>",
  "followers": {followers},
  "primary_niche": "one-sentence summary of the main content pillar",
  "secondary_topics": ["up to 5 topics"],
  "content_style": "threads, charts, memes, one-liners, educational, ...",
  "average_likes_per_post": 0.0,
  "average_views_per_post": 0.0,
  "growth_trend_last_30_days": "growing fast | growing steadily | stagnant | declining",
  "estimated_monthly_follower_growth_percent": 0.0,
  "language_mix": "English 90%, Spanish 10%",
  "posting_frequency_per_week": 0,
  "visual_content_ratio": "high | medium | low",
  "key_hashtags": ["up to 8 hashtags"],
  "strengths": ["up to 4 short bullets"],
  "weaknesses_for_growth": ["up to 4 short bullets"]
}"#;

const PEERS_SHAPE: &str = r#"{
  "peers": [
    {
      "handle": "exampleuser",
      "followers": 150000,
      "primary_niche": "detailed niche description",
      "secondary_topics": ["topic1", "topic2"],
      "content_style": "threads with data, polls",
      "average_likes_per_post": 500,
      "average_views_per_post": 25000,
      "growth_trend_last_30_days": "growing fast",
      "estimated_monthly_growth_percent": 12.0,
      "posting_frequency_per_week": 18,
      "visual_content_ratio": "high",
      "language_mix": "English 100%",
      "match_score": 85,
      "match_reason": "why this account is comparable",
      "growth_edge": "what this account does that drives its growth",
      "strengths": ["..."],
      "weaknesses_for_growth": ["..."]
    }
  ]
}"#;

const REPORT_SHAPE: &str = r#"{
  "growth_score": 6.5,
  "growth_score_explanation": "how the user compares with the peers",
  "posting_analysis": {"user_frequency": "", "peer_average_frequency": "", "consistency_gap": "", "recommendations": []},
  "content_analysis": {"user_content_mix": "", "peer_content_mix": "", "media_usage_gap": "", "thread_usage_gap": "", "recommendations": []},
  "topic_analysis": {"user_topics": [], "peer_trending_topics": [], "missing_topics": [], "recommendations": []},
  "structure_analysis": {"tweet_length_pattern": "", "engagement_hooks": "", "cta_usage": "", "recommendations": []},
  "insights": [
    {
      "title": "short imperative title",
      "category": "posting | content | topics | structure | engagement",
      "priority": "high | medium | low",
      "current_state": "what the user does now",
      "peer_state": "what the peers do",
      "gap_impact": "why the gap matters",
      "action": "the concrete change to make",
      "expected_result": "what should improve",
      "measurement": "how to tell it worked"
    }
  ],
  "quick_wins": ["changes that take under a day"],
  "peer_standout_tactics": ["specific tactics peers use"]
}"#;

/// JSON template for profile replies, pre-filled with the measured follower count.
fn profile_shape(followers: u64) -> String {
    PROFILE_SHAPE.replace("{followers}", &followers.to_string())
}

/// Profile prompt for accounts small enough that the model needs their posts.
#[must_use]
pub fn profile_with_posts(account: &AccountSnapshot, posts: &[Post]) -> Vec<ChatMessage> {
    let recent: Vec<Value> = posts
        .iter()
        .take(MAX_PROMPT_POSTS)
        .map(|p| {
            json!({
                "text": p.text,
                "likes": p.like_count,
                "reposts": p.retweet_count,
                "replies": p.reply_count,
                "views": p.view_count.unwrap_or(0),
                "created_at": p.created_at.as_deref().unwrap_or(""),
            })
        })
        .collect();
    let recent = serde_json::to_string_pretty(&recent).unwrap_or_else(|_| "[]".to_string());

    let user = format!(
        "Analyze this account.\n\n\
         Handle: {handle}\n\
         Bio: {bio}\n\
         Followers: {followers}\n\
         Following: {following}\n\
         Total posts: {post_count}\n\n\
         Recent posts, newest first:\n{recent}\n\n\
         Return exactly this JSON structure:\n{shape}",
        handle = account.handle,
        bio = account.description.as_deref().unwrap_or(""),
        followers = account.followers,
        shape = profile_shape(account.followers),
        following = account.following,
        post_count = account.post_count,
    );
    vec![ChatMessage::system(ANALYST_ROLE), ChatMessage::user(user)]
}

/// Profile prompt for famous accounts the model already knows.
#[must_use]
pub fn profile_handle_only(account: &AccountSnapshot) -> Vec<ChatMessage> {
    let user = format!(
        "Profile {display} from your own knowledge of the account.\n\n\
         Handle: {handle}\n\
         Bio: {bio}\n\
         Current followers: {followers}\n\n\
         Return exactly this JSON structure:\n{shape}",
        display = account.handle.display_name(),
        handle = account.handle,
        bio = account.description.as_deref().unwrap_or(""),
        followers = account.followers,
        shape = profile_shape(account.followers),
    );
    vec![ChatMessage::system(ANALYST_ROLE), ChatMessage::user(user)]
}

/// Peer discovery prompt. The follower window mirrors the pool band rules:
/// roughly 0.4x to 4x of the user's audience.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn find_peers(profile: &DerivedProfile, followers: u64, count: usize) -> Vec<ChatMessage> {
    let low = (followers as f64 * 0.4) as u64;
    let high = followers.saturating_mul(4);
    let user = format!(
        "Find {count} accounts similar to @{handle} that are growing faster.\n\n\
         User profile:\n\
         - Followers: {followers}\n\
         - Niche: {niche}\n\
         - Topics: {topics}\n\
         - Content style: {style}\n\
         - Language: {language}\n\n\
         Rules:\n\
         - Same primary niche and at least two overlapping topics\n\
         - Follower count between {low} and {high}\n\
         - Clearly growing over the last 60 days\n\
         - Posting at least three times a week\n\n\
         Use your own knowledge of X accounts and give a complete profile \
         for each peer.\n\n\
         Return exactly this JSON structure with {count} peers:\n{PEERS_SHAPE}",
        handle = profile.handle.trim_start_matches('@'),
        niche = non_empty(&profile.primary_niche, "general content"),
        topics = json!(profile.secondary_topics),
        style = profile.content_style.as_deref().unwrap_or("varied"),
        language = profile
            .language_mix
            .as_ref()
            .map_or_else(|| "English 100%".to_string(), value_text),
    );
    vec![ChatMessage::system(ANALYST_ROLE), ChatMessage::user(user)]
}

/// Comparative report prompt: the user against the top peers.
#[must_use]
pub fn generate_insights(profile: &DerivedProfile, peers: &[PeerRecord]) -> Vec<ChatMessage> {
    let mut peer_block = String::new();
    for (i, peer) in peers.iter().take(MAX_PROMPT_PEERS).enumerate() {
        let p = &peer.profile;
        peer_block.push_str(&format!(
            "\nPEER {n}: {display} ({followers} followers)\n\
             Niche: {niche}\n\
             Topics: {topics}\n\
             Style: {style}\n\
             Posts/week: {per_week}\n\
             Likes: {likes} | Views: {views}\n\
             Growth: {growth}% per month\n\
             Visual content: {visual}\n\
             Hashtags: {hashtags}\n\
             Strengths: {strengths}\n\
             Growth edge: {edge}\n",
            n = i + 1,
            display = peer.handle.display_name(),
            followers = peer.followers,
            niche = p.primary_niche,
            topics = json!(p.secondary_topics),
            style = p.content_style.as_deref().unwrap_or(""),
            per_week = number_text(p.posting_frequency_per_week),
            likes = number_text(p.average_likes_per_post),
            views = number_text(p.average_views_per_post),
            growth = number_text(peer.profile.estimated_monthly_follower_growth_percent),
            visual = p.visual_content_ratio.as_deref().unwrap_or("medium"),
            hashtags = json!(p.key_hashtags.iter().take(5).collect::<Vec<_>>()),
            strengths = json!(p.strengths),
            edge = peer.growth_edge,
        ));
    }

    let user = format!(
        "Compare the user with faster-growing peers and explain the gap.\n\n\
         USER: @{handle}\n\
         Followers: {followers}\n\
         Primary niche: {niche}\n\
         Topics: {topics}\n\
         Content style: {style}\n\
         Posts/week: {per_week}\n\
         Avg likes: {likes}\n\
         Avg views: {views}\n\
         Growth: {growth}% per month\n\
         Visual content: {visual}\n\
         Hashtags: {hashtags}\n\
         Strengths: {strengths}\n\
         Weaknesses: {weaknesses}\n\n\
         PEERS (growing faster):\n{peer_block}\n\
         Score the user from 0 to 10 against the peers, analyse posting, \
         content, topics and structure, and give at least three concrete \
         insights.\n\n\
         Return exactly this JSON structure:\n{REPORT_SHAPE}",
        handle = profile.handle.trim_start_matches('@'),
        followers = profile.followers.unwrap_or(0),
        niche = non_empty(&profile.primary_niche, "N/A"),
        topics = json!(profile.secondary_topics),
        style = profile.content_style.as_deref().unwrap_or("N/A"),
        per_week = number_text(profile.posting_frequency_per_week),
        likes = number_text(profile.average_likes_per_post),
        views = number_text(profile.average_views_per_post),
        growth = number_text(profile.estimated_monthly_follower_growth_percent),
        visual = profile.visual_content_ratio.as_deref().unwrap_or("medium"),
        hashtags = json!(profile.key_hashtags),
        strengths = json!(profile.strengths),
        weaknesses = json!(profile.weaknesses_for_growth),
    );
    vec![ChatMessage::system(ANALYST_ROLE), ChatMessage::user(user)]
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn number_text(value: Option<f64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use peerscope_core::Handle;

    use super::*;

    fn account(followers: u64) -> AccountSnapshot {
        AccountSnapshot {
            external_id: Some("1".to_string()),
            handle: Handle::parse("alice").unwrap(),
            name: None,
            description: Some("money talk".to_string()),
            profile_image_url: None,
            followers,
            following: 10,
            post_count: 100,
        }
    }

    fn post(id: usize) -> Post {
        Post {
            id: id.to_string(),
            text: format!("post number {id}"),
            created_at: None,
            like_count: 1,
            retweet_count: 0,
            reply_count: 0,
            quote_count: 0,
            view_count: None,
        }
    }

    #[test]
    fn profile_prompt_caps_posts() {
        let posts: Vec<Post> = (0..60).map(post).collect();
        let messages = profile_with_posts(&account(5_000), &posts);
        let user = &messages[1].content;
        assert!(user.contains("post number 39"));
        assert!(!user.contains("post number 40"));
    }

    #[test]
    fn handle_only_prompt_has_no_posts() {
        let messages = profile_handle_only(&account(2_100_000));
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("@alice"));
        assert!(!messages[1].content.contains("Recent posts"));
    }

    #[test]
    fn profile_template_carries_measured_followers() {
        let messages = profile_handle_only(&account(2_100_000));
        assert!(messages[1].content.contains("\"followers\": 2100000,"));
        assert!(!messages[1].content.contains("{followers}"));

        let messages = profile_with_posts(&account(5_000), &[post(1)]);
        assert!(messages[1].content.contains("\"followers\": 5000,"));
    }

    #[test]
    fn peer_prompt_states_follower_window() {
        let profile = DerivedProfile {
            handle: "alice".to_string(),
            primary_niche: "personal finance".to_string(),
            ..DerivedProfile::default()
        };
        let content = &find_peers(&profile, 10_000, 5)[1].content;
        assert!(content.contains("between 4000 and 40000"));
        assert!(content.contains("Find 5 accounts"));
    }
}
