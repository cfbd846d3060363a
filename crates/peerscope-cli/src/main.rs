mod analyze;
mod cache;
mod maintain;
mod pool;
mod user;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use peerscope_engine::{AnalysisStore, PgStore};
use tracing_subscriber::EnvFilter;

use crate::{cache::CacheCommands, pool::PoolCommands, user::UserCommands};

#[derive(Debug, Parser)]
#[command(name = "peerscope-cli")]
#[command(about = "Peer-benchmarked growth analysis for X accounts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Tracked accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Run a full growth analysis for one user
    Analyze {
        /// User id (see `user add`)
        #[arg(long)]
        user: i64,
        /// Ignore the cached profile and build a new one
        #[arg(long)]
        refresh_profile: bool,
        /// Skip cached assignments and the pool and discover new peers
        #[arg(long)]
        refresh_peers: bool,
    },
    /// Shared peer pool maintenance
    Pool {
        #[command(subcommand)]
        command: PoolCommands,
    },
    /// Tweet cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Run the scheduled cleanup jobs until interrupted
    Maintain,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(peerscope_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("peerscope-cli ready; run with --help for commands");
        return Ok(());
    };

    // Computing a pool key needs no database.
    if let Commands::Pool {
        command: PoolCommands::Key { niche, followers },
    } = &command
    {
        pool::run_pool_key(niche, *followers);
        return Ok(());
    }

    let pool = peerscope_db::connect_pool_from_config(&config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Migrate => {
                let applied = peerscope_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
            DbCommands::Ping => {
                peerscope_db::health_check(&pool).await?;
                println!("database ok");
            }
        },
        Commands::User { command } => {
            let store = pg_store(&pool);
            match command {
                UserCommands::Add { handle } => user::run_user_add(store.as_ref(), &handle).await?,
                UserCommands::Show { id } => user::run_user_show(store.as_ref(), id).await?,
            }
        }
        Commands::Analyze {
            user,
            refresh_profile,
            refresh_peers,
        } => {
            analyze::run_analyze(&config, pg_store(&pool), user, refresh_profile, refresh_peers)
                .await?;
        }
        Commands::Pool { command } => {
            let peers = pool::peer_pool(&config, pg_store(&pool));
            match command {
                PoolCommands::Key { .. } => {}
                PoolCommands::Stats { pool_key } => {
                    pool::run_pool_stats(&peers, pool_key.as_deref()).await?;
                }
                PoolCommands::Cleanup { days } => {
                    pool::run_pool_cleanup(&peers, days.unwrap_or(config.pool_stale_days)).await?;
                }
                PoolCommands::Invalidate { handle, pool_key } => {
                    pool::run_pool_invalidate(&peers, &handle, &pool_key).await?;
                }
            }
        }
        Commands::Cache { command } => {
            let tweets = cache::tweet_cache(&config, pg_store(&pool));
            match command {
                CacheCommands::Stats => cache::run_cache_stats(&tweets).await?,
                CacheCommands::Invalidate { handle } => {
                    cache::run_cache_invalidate(&tweets, &handle).await?;
                }
                CacheCommands::Cleanup { days } => {
                    cache::run_cache_cleanup(
                        &tweets,
                        days.unwrap_or(config.tweet_cache_retention_days),
                    )
                    .await?;
                }
            }
        }
        Commands::Maintain => {
            peerscope_db::run_migrations(&pool).await?;
            maintain::run_maintain(pg_store(&pool), Arc::clone(&config)).await?;
        }
    }

    Ok(())
}

fn pg_store(pool: &sqlx::PgPool) -> Arc<dyn AnalysisStore> {
    Arc::new(PgStore::new(pool.clone()))
}
