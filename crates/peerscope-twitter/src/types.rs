//! Wire types for twitterapi.io responses.
//!
//! Fields default when absent; the API omits zero counters on some accounts.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    #[serde(default)]
    pub data: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub statuses_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastTweetsResponse {
    #[serde(default)]
    pub data: Option<LastTweetsData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastTweetsData {
    #[serde(default)]
    pub tweets: Option<Vec<ApiTweet>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiTweet {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "retweeted_tweet")]
    pub retweeted_tweet: Option<serde_json::Value>,
    #[serde(default)]
    pub is_reply: bool,
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

impl ApiTweet {
    /// Retweets and replies are not the author's original content.
    pub fn is_original(&self) -> bool {
        let is_retweet = self.kind.as_deref() == Some("retweet")
            || self.retweeted_tweet.as_ref().is_some_and(|v| !v.is_null());
        !is_retweet && !self.is_reply
    }
}
