//! The `analyze` command: one full run against the live collaborators.

use std::sync::Arc;

use peerscope_core::{AppConfig, CostSummary, ErrorKind};
use peerscope_engine::{AnalysisOrchestrator, AnalysisOutcome, AnalysisStore, SystemClock};
use peerscope_llm::GrokGrowthModel;
use peerscope_twitter::TwitterApiClient;

/// Run a full analysis for `user_id` and print the report.
///
/// # Errors
///
/// Returns an error if an API key is missing or the run fails. The failure
/// kind (`rate_limited`, `not_found`, ...) is part of the message.
pub(crate) async fn run_analyze(
    config: &AppConfig,
    store: Arc<dyn AnalysisStore>,
    user_id: i64,
    refresh_profile: bool,
    refresh_peers: bool,
) -> anyhow::Result<()> {
    let social = Arc::new(TwitterApiClient::from_app_config(config)?);
    let model = Arc::new(GrokGrowthModel::from_app_config(config)?);
    let orchestrator =
        AnalysisOrchestrator::from_app_config(config, store, Arc::new(SystemClock), social, model);

    let outcome = match orchestrator
        .run_full_analysis(user_id, refresh_profile, refresh_peers)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let kind = e.kind().map_or("internal", ErrorKind::as_str);
            tracing::error!(user_id, kind, error = %e, "analysis failed");
            anyhow::bail!("analysis failed ({kind}): {e}");
        }
    };

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let profile = &outcome.profile;
    let report = &outcome.report;

    println!("analysis {}", outcome.analysis.public_id);
    println!(
        "{} | {} followers | niche {} | {} posts analyzed",
        profile.handle.display_name(),
        profile.metrics.followers,
        profile.niche,
        profile.posts_analyzed
    );
    if let Some(rate) = profile.engagement_rate() {
        println!("engagement rate {rate:.2}%");
    }
    println!();

    println!("growth score {:.1}/10", report.score());
    if let Some(explanation) = &report.growth_score_explanation {
        println!("  {explanation}");
    }
    println!();

    println!("peers ({})", outcome.peer_source);
    println!("{:<22}{:>12}{:>8}  EDGE", "HANDLE", "FOLLOWERS", "MATCH");
    for peer in &outcome.peers {
        println!(
            "{:<22}{:>12}{:>8.0}  {}",
            peer.handle.display_name(),
            peer.followers,
            peer.match_score,
            peer.growth_edge
        );
    }
    println!();

    println!("insights");
    for insight in &report.insights {
        let priority = insight.priority.as_deref().unwrap_or("-");
        println!("  [{priority}] {}", insight.title);
        if let Some(action) = &insight.action {
            println!("      {action}");
        }
    }
    if !report.quick_wins.is_empty() {
        println!("quick wins");
        for win in &report.quick_wins {
            println!("  - {win}");
        }
    }
    println!();

    print_cost(&outcome.cost);
}

fn print_cost(cost: &CostSummary) {
    println!("{:<16}{:>8}{:>12}{:>14}", "API", "CALLS", "UNITS", "USD");
    println!(
        "{:<16}{:>8}{:>12}{:>14}",
        "social",
        cost.social.user_info_calls + cost.social.posts_calls,
        cost.social.total_credits,
        cost.social.cost_usd.round_dp(5)
    );
    println!(
        "{:<16}{:>8}{:>12}{:>14}",
        "language model",
        cost.language_model.api_calls,
        cost.language_model.input_tokens + cost.language_model.output_tokens,
        cost.language_model.cost_usd.round_dp(5)
    );
    println!("{:<36}{:>14}", "total", cost.total_cost_usd.round_dp(5));
}
