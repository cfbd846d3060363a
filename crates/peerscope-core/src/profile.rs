//! Account metrics, raw posts and AI-derived profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::handle::Handle;
use crate::CoreError;

/// Coarse niche labels and the keywords that select them, checked in order.
const NICHE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "tech",
        &[
            "technology",
            "software",
            "developer",
            "programming",
            "ai",
            "machine learning",
        ],
    ),
    (
        "business",
        &["business", "entrepreneur", "startup", "founder", "saas"],
    ),
    ("marketing", &["marketing", "content", "seo", "branding"]),
    (
        "finance",
        &["finance", "investing", "trading", "stocks", "crypto"],
    ),
    ("health", &["health", "fitness", "wellness", "nutrition"]),
];

/// Fallback label when no keyword matches.
pub const OTHER_NICHE: &str = "other";

/// Maps a free-text niche description onto a coarse pool partition label.
///
/// Multi-word keywords match as substrings; single-word keywords must match a
/// whole word, so "ai" selects "AI tooling" but not "retail".
#[must_use]
pub fn coarse_niche(primary_niche: &str) -> &'static str {
    let lower = primary_niche.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (label, keywords) in NICHE_KEYWORDS {
        let hit = keywords.iter().any(|kw| {
            if kw.contains(' ') {
                lower.contains(kw)
            } else {
                words.iter().any(|w| w == kw)
            }
        });
        if hit {
            return label;
        }
    }
    OTHER_NICHE
}

/// Account details returned by the social-data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub external_id: Option<String>,
    pub handle: Handle,
    pub name: Option<String>,
    pub description: Option<String>,
    pub profile_image_url: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub post_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    pub followers: u64,
    pub following: u64,
    pub post_count: u64,
    pub follower_following_ratio: f64,
}

impl BasicMetrics {
    /// Ratio is rounded to two decimals; an account following nobody reports
    /// its follower count as the ratio.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(followers: u64, following: u64, post_count: u64) -> Self {
        let follower_following_ratio = if following == 0 {
            followers as f64
        } else {
            round2(followers as f64 / following as f64)
        };
        Self {
            followers,
            following,
            post_count,
            follower_following_ratio,
        }
    }
}

impl From<&AccountSnapshot> for BasicMetrics {
    fn from(account: &AccountSnapshot) -> Self {
        Self::new(account.followers, account.following, account.post_count)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One original post (no retweets, no replies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub view_count: Option<u64>,
}

/// AI-produced profile of one account.
///
/// Known fields are typed; anything else the model returns is kept in
/// `extensions` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedProfile {
    #[serde(default)]
    pub handle: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub followers: Option<u64>,
    #[serde(default)]
    pub primary_niche: String,
    #[serde(default)]
    pub secondary_topics: Vec<String>,
    #[serde(default)]
    pub content_style: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_likes_per_post: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_views_per_post: Option<f64>,
    #[serde(default)]
    pub growth_trend_last_30_days: Option<String>,
    #[serde(
        default,
        alias = "estimated_monthly_growth_percent",
        deserialize_with = "lenient_f64"
    )]
    pub estimated_monthly_follower_growth_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub posting_frequency_per_week: Option<f64>,
    #[serde(default)]
    pub visual_content_ratio: Option<String>,
    #[serde(default)]
    pub language_mix: Option<Value>,
    #[serde(default)]
    pub key_hashtags: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses_for_growth: Vec<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl DerivedProfile {
    /// Validates and converts a model response into a profile.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Shape`] if a known field has the wrong type.
    /// - [`CoreError::MissingProfileField`] if `handle` or `primary_niche` is
    ///   absent or blank.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let profile: Self = serde_json::from_value(value)?;
        if profile.handle.trim().is_empty() {
            return Err(CoreError::MissingProfileField("handle"));
        }
        if profile.primary_niche.trim().is_empty() {
            return Err(CoreError::MissingProfileField("primary_niche"));
        }
        Ok(profile)
    }

    #[must_use]
    pub fn coarse_niche(&self) -> &'static str {
        coarse_niche(&self.primary_niche)
    }

    /// `average_likes / followers * 100`, two decimals. `None` without both inputs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn engagement_rate(&self, followers: u64) -> Option<f64> {
        let likes = self.average_likes_per_post?;
        (followers > 0).then(|| round2(likes / followers as f64 * 100.0))
    }
}

/// One cached profile. Never mutated after insert; a refresh writes a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: i64,
    pub user_id: i64,
    pub handle: Handle,
    pub metrics: BasicMetrics,
    pub derived: DerivedProfile,
    pub niche: String,
    pub posts_analyzed: u32,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProfileRecord {
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    #[must_use]
    pub fn engagement_rate(&self) -> Option<f64> {
        self.derived.engagement_rate(self.metrics.followers)
    }
}

/// Accepts a JSON number or a numeric string.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let trimmed = s.trim().trim_end_matches('%').replace(',', "");
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("expected a number, got \"{s}\"")))
        }
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let rounded = v.round() as u64;
            Ok(Some(rounded))
        }
        Some(v) => Err(serde::de::Error::custom(format!(
            "expected a non-negative count, got {v}"
        ))),
    }
}
