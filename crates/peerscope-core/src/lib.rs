//! Shared domain types for peerscope: account handles, follower bands and pool
//! keys, derived profiles, peer records, growth reports, the per-run cost
//! ledger, the external-call error taxonomy and application configuration.

pub mod app_config;
pub mod band;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod handle;
pub mod peer;
pub mod profile;
pub mod report;
pub mod source;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use band::{FollowerBand, PoolKey};
pub use config::{load_app_config, load_app_config_from_env, load_app_config_from_lookup};
pub use context::RunContext;
pub use cost::{CostEvent, CostLedger, CostSummary, LanguageModelCostSummary, SocialCostSummary};
pub use error::{ErrorKind, ExternalError};
pub use handle::Handle;
pub use peer::{PeerPoolEntry, PeerRecord, PoolStats, PoolUsageLeader};
pub use profile::{coarse_niche, AccountSnapshot, BasicMetrics, DerivedProfile, Post, ProfileRecord};
pub use report::{Insight, Report};
pub use source::{GrowthModel, SocialDataSource};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("account handle is empty")]
    EmptyHandle,
    #[error("invalid pool key \"{0}\"")]
    InvalidPoolKey(String),
    #[error("derived profile is missing required field `{0}`")]
    MissingProfileField(&'static str),
    #[error("report is missing required section `{0}`")]
    MissingReportSection(&'static str),
    #[error("report contains no insights")]
    EmptyInsights,
    #[error("growth score {0} is outside 0..=10")]
    GrowthScoreOutOfRange(f64),
    #[error("peer record is invalid: {0}")]
    InvalidPeer(String),
    #[error("payload does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
