#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub twitter_api_key: Option<String>,
    pub twitter_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub twitter_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub max_retries: u32,
    pub twitter_rate_limit_backoff_secs: u64,
    pub twitter_courtesy_delay_ms: u64,
    pub timeout_retry_delay_secs: u64,
    pub profile_ttl_hours: i64,
    pub tweet_cache_ttl_hours: i64,
    pub peer_match_ttl_hours: i64,
    pub pool_validation_days: i64,
    pub pool_stale_days: i64,
    pub tweet_cache_retention_days: i64,
    pub famous_threshold: u64,
    pub tweet_fetch_limit: usize,
    pub peer_count: usize,
    pub min_cached_peers: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "twitter_api_key",
                &self.twitter_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("twitter_base_url", &self.twitter_base_url)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("twitter_timeout_secs", &self.twitter_timeout_secs)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field(
                "twitter_rate_limit_backoff_secs",
                &self.twitter_rate_limit_backoff_secs,
            )
            .field("twitter_courtesy_delay_ms", &self.twitter_courtesy_delay_ms)
            .field("timeout_retry_delay_secs", &self.timeout_retry_delay_secs)
            .field("profile_ttl_hours", &self.profile_ttl_hours)
            .field("tweet_cache_ttl_hours", &self.tweet_cache_ttl_hours)
            .field("peer_match_ttl_hours", &self.peer_match_ttl_hours)
            .field("pool_validation_days", &self.pool_validation_days)
            .field("pool_stale_days", &self.pool_stale_days)
            .field(
                "tweet_cache_retention_days",
                &self.tweet_cache_retention_days,
            )
            .field("famous_threshold", &self.famous_threshold)
            .field("tweet_fetch_limit", &self.tweet_fetch_limit)
            .field("peer_count", &self.peer_count)
            .field("min_cached_peers", &self.min_cached_peers)
            .finish()
    }
}
