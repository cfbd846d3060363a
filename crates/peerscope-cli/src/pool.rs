//! Peer pool command handlers.

use std::sync::Arc;

use clap::Subcommand;
use peerscope_core::{AppConfig, Handle, PoolKey};
use peerscope_engine::{AnalysisStore, PeerPool, PeerPoolSettings, SystemClock};

/// Sub-commands available under `pool`.
#[derive(Debug, Subcommand)]
pub enum PoolCommands {
    /// Print the pool key for a niche and follower count
    Key {
        /// Coarse niche label (tech, business, marketing, finance, health, other)
        #[arg(long)]
        niche: String,
        #[arg(long)]
        followers: u64,
    },
    /// Show pool health, for every pool or one key
    Stats {
        /// Restrict to one pool, e.g. `finance_2500-12500`
        #[arg(long)]
        pool_key: Option<String>,
    },
    /// Delete stale entries, then entries marked invalid
    Cleanup {
        /// Age in days past which an entry is stale (defaults to the configured value)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Mark one entry invalid so it is no longer served
    Invalidate {
        #[arg(long)]
        handle: String,
        #[arg(long)]
        pool_key: String,
    },
}

pub(crate) fn peer_pool(config: &AppConfig, store: Arc<dyn AnalysisStore>) -> PeerPool {
    PeerPool::new(
        store,
        Arc::new(SystemClock),
        PeerPoolSettings::from_app_config(config),
    )
}

pub(crate) fn run_pool_key(niche: &str, followers: u64) {
    println!("{}", PeerPool::pool_key(niche, followers));
}

/// # Errors
///
/// Returns an error if the pool key does not parse or a query fails.
pub(crate) async fn run_pool_stats(peers: &PeerPool, pool_key: Option<&str>) -> anyhow::Result<()> {
    let key = pool_key.map(str::parse::<PoolKey>).transpose()?;
    let stats = peers.stats(key.as_ref()).await?;

    if let Some(key) = &key {
        println!("pool {key}");
    }
    println!("{:<10}{:<10}{:<10}INVALID", "TOTAL", "VALID", "STALE");
    println!(
        "{:<10}{:<10}{:<10}{}",
        stats.total, stats.valid, stats.stale, stats.invalid
    );

    if !stats.most_used.is_empty() {
        println!();
        println!("{:<22}{:<28}USED", "HANDLE", "POOL");
        for leader in &stats.most_used {
            println!(
                "{:<22}{:<28}{}",
                leader.handle.display_name(),
                leader.pool_key,
                leader.times_used
            );
        }
    }

    if !stats.by_niche.is_empty() {
        println!();
        println!("{:<14}ENTRIES", "NICHE");
        for (niche, entries) in &stats.by_niche {
            println!("{niche:<14}{entries}");
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if either delete fails.
pub(crate) async fn run_pool_cleanup(peers: &PeerPool, days: i64) -> anyhow::Result<()> {
    let stale = peers.cleanup_stale(days).await?;
    let invalid = peers.cleanup_invalid().await?;
    println!("removed {stale} stale and {invalid} invalid pool entries");
    Ok(())
}

/// # Errors
///
/// Returns an error if the handle or key does not parse, no entry matches, or
/// the update fails.
pub(crate) async fn run_pool_invalidate(
    peers: &PeerPool,
    raw_handle: &str,
    pool_key: &str,
) -> anyhow::Result<()> {
    let handle = Handle::parse(raw_handle)?;
    let key: PoolKey = pool_key.parse()?;
    if !peers.mark_invalid(&handle, &key).await? {
        anyhow::bail!("no entry for {} in pool {key}", handle.display_name());
    }
    println!("marked {} invalid in {key}", handle.display_name());
    Ok(())
}
