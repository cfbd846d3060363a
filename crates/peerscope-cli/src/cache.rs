//! Tweet cache command handlers.

use std::sync::Arc;

use clap::Subcommand;
use peerscope_core::{AppConfig, Handle};
use peerscope_engine::{AnalysisStore, SystemClock, TweetCache};

/// Sub-commands available under `cache`.
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Show entry counts and the TTL
    Stats,
    /// Drop every cached fetch for one account
    Invalidate {
        #[arg(long)]
        handle: String,
    },
    /// Delete entries older than the retention window
    Cleanup {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<i64>,
    },
}

pub(crate) fn tweet_cache(config: &AppConfig, store: Arc<dyn AnalysisStore>) -> TweetCache {
    TweetCache::new(store, Arc::new(SystemClock), config.tweet_cache_ttl_hours)
}

/// # Errors
///
/// Returns an error if the count query fails.
pub(crate) async fn run_cache_stats(tweets: &TweetCache) -> anyhow::Result<()> {
    let stats = tweets.stats().await?;
    println!("{:<10}{:<10}{:<10}TTL", "TOTAL", "FRESH", "STALE");
    println!(
        "{:<10}{:<10}{:<10}{}h",
        stats.total, stats.fresh, stats.stale, stats.ttl_hours
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the handle is empty or the delete fails.
pub(crate) async fn run_cache_invalidate(tweets: &TweetCache, raw_handle: &str) -> anyhow::Result<()> {
    let handle = Handle::parse(raw_handle)?;
    let removed = tweets.invalidate(&handle).await?;
    println!("removed {removed} cached fetch(es) for {}", handle.display_name());
    Ok(())
}

/// # Errors
///
/// Returns an error if the delete fails.
pub(crate) async fn run_cache_cleanup(tweets: &TweetCache, days: i64) -> anyhow::Result<()> {
    let removed = tweets.cleanup(days).await?;
    println!("removed {removed} tweet cache entries older than {days} day(s)");
    Ok(())
}
