//! Tracked-account command handlers.

use clap::Subcommand;
use peerscope_core::Handle;
use peerscope_engine::AnalysisStore;

/// Sub-commands available under `user`.
#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// Register an account handle (idempotent)
    Add {
        /// Account handle, with or without the leading `@`
        #[arg(long)]
        handle: String,
    },
    /// Show a user and their latest analysis
    Show {
        /// User id
        #[arg(long)]
        id: i64,
    },
}

/// # Errors
///
/// Returns an error if the handle is empty or the insert fails.
pub(crate) async fn run_user_add(store: &dyn AnalysisStore, raw_handle: &str) -> anyhow::Result<()> {
    let handle = Handle::parse(raw_handle)?;
    let user = store.upsert_user(&handle, None).await?;
    println!("user {} -> id {}", user.handle.display_name(), user.id);
    Ok(())
}

/// # Errors
///
/// Returns an error if the user does not exist or a query fails.
pub(crate) async fn run_user_show(store: &dyn AnalysisStore, id: i64) -> anyhow::Result<()> {
    let user = store
        .get_user(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;

    println!("{:<18}{}", "HANDLE", user.handle.display_name());
    println!("{:<18}{}", "CREATED", user.created_at.format("%Y-%m-%d %H:%M"));
    println!(
        "{:<18}{}",
        "LAST ANALYSIS",
        user.last_analysis_at
            .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
    );

    if let Some(analysis) = store.latest_analysis(id).await? {
        println!("{:<18}{:.1}", "GROWTH SCORE", analysis.growth_score);
        println!("{:<18}{}", "PEER SOURCE", analysis.peer_source);
        println!("{:<18}{}", "PEERS", analysis.peer_handles.join(", "));
    }
    Ok(())
}
