//! The `maintain` command: recurring cleanup jobs.
//!
//! Runs a [`JobScheduler`] with three daily jobs until ctrl-c. Job failures
//! are logged and the next run proceeds as scheduled.

use std::sync::Arc;

use peerscope_core::AppConfig;
use peerscope_engine::{AnalysisStore, PeerPool, TweetCache};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::{cache::tweet_cache, pool::peer_pool};

const STALE_POOL_CRON: &str = "0 0 3 * * *";
const INVALID_POOL_CRON: &str = "0 15 3 * * *";
const TWEET_CACHE_CRON: &str = "0 30 3 * * *";

/// Start the scheduler and block until interrupted.
///
/// # Errors
///
/// Returns an error if the scheduler cannot be built, started or shut down,
/// or the ctrl-c handler cannot be installed.
pub(crate) async fn run_maintain(
    store: Arc<dyn AnalysisStore>,
    config: Arc<AppConfig>,
) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(store, &config).await?;
    tracing::info!("scheduler: running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

/// Builds and starts the scheduler with every maintenance job registered.
///
/// The returned handle must be kept alive; dropping it stops the jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, a
/// job cannot be registered, or the scheduler fails to start.
pub(crate) async fn build_scheduler(
    store: Arc<dyn AnalysisStore>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let peers = peer_pool(config, Arc::clone(&store));
    register_stale_pool_job(&scheduler, peers.clone(), config.pool_stale_days).await?;
    register_invalid_pool_job(&scheduler, peers).await?;
    register_tweet_cache_job(
        &scheduler,
        tweet_cache(config, store),
        config.tweet_cache_retention_days,
    )
    .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Daily at 03:00 UTC: delete pool entries not validated for `days` days.
async fn register_stale_pool_job(
    scheduler: &JobScheduler,
    peers: PeerPool,
    days: i64,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(STALE_POOL_CRON, move |_uuid, _lock| {
        let peers = peers.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting stale pool cleanup");
            match peers.cleanup_stale(days).await {
                Ok(removed) => tracing::info!(removed, "scheduler: stale pool cleanup complete"),
                Err(e) => tracing::error!(error = %e, "scheduler: stale pool cleanup failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = STALE_POOL_CRON, days, "scheduler: registered stale pool job");
    Ok(())
}

/// Daily at 03:15 UTC: delete pool entries marked invalid.
async fn register_invalid_pool_job(
    scheduler: &JobScheduler,
    peers: PeerPool,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(INVALID_POOL_CRON, move |_uuid, _lock| {
        let peers = peers.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting invalid pool cleanup");
            match peers.cleanup_invalid().await {
                Ok(removed) => tracing::info!(removed, "scheduler: invalid pool cleanup complete"),
                Err(e) => tracing::error!(error = %e, "scheduler: invalid pool cleanup failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = INVALID_POOL_CRON, "scheduler: registered invalid pool job");
    Ok(())
}

/// Daily at 03:30 UTC: delete tweet cache entries older than `days` days.
async fn register_tweet_cache_job(
    scheduler: &JobScheduler,
    tweets: TweetCache,
    days: i64,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(TWEET_CACHE_CRON, move |_uuid, _lock| {
        let tweets = tweets.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting tweet cache cleanup");
            match tweets.cleanup(days).await {
                Ok(removed) => tracing::info!(removed, "scheduler: tweet cache cleanup complete"),
                Err(e) => tracing::error!(error = %e, "scheduler: tweet cache cleanup failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = TWEET_CACHE_CRON, days, "scheduler: registered tweet cache job");
    Ok(())
}
