//! Capability interfaces for the two external collaborators.
//!
//! Wire formats live behind these traits; the engine only sees typed results
//! and [`ExternalError`].

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::ExternalError;
use crate::handle::Handle;
use crate::peer::PeerRecord;
use crate::profile::{AccountSnapshot, DerivedProfile, Post};
use crate::report::Report;

/// Social-data API: account lookup and recent posts.
#[async_trait]
pub trait SocialDataSource: Send + Sync {
    /// Looks up one account.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::NotFound`] for unknown handles, or any other
    /// terminal failure from the underlying API.
    async fn user_by_handle(
        &self,
        ctx: &RunContext,
        handle: &Handle,
    ) -> Result<AccountSnapshot, ExternalError>;

    /// Up to `max_results` most recent original posts, newest first.
    /// Retweets and replies are excluded.
    ///
    /// # Errors
    ///
    /// Returns any terminal failure from the underlying API.
    async fn recent_posts(
        &self,
        ctx: &RunContext,
        handle: &Handle,
        max_results: usize,
    ) -> Result<Vec<Post>, ExternalError>;
}

/// Language-model collaborator that profiles accounts, discovers peers and
/// writes the comparison report.
#[async_trait]
pub trait GrowthModel: Send + Sync {
    /// Profiles an account. `posts` is `None` for accounts famous enough to be
    /// profiled from the model's background knowledge.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::MalformedResponse`] or
    /// [`ExternalError::Validation`] for unusable output, or any transport
    /// failure.
    async fn profile(
        &self,
        ctx: &RunContext,
        account: &AccountSnapshot,
        posts: Option<&[Post]>,
    ) -> Result<DerivedProfile, ExternalError>;

    /// Finds up to `count` comparable, faster-growing accounts, best match first.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] when the model returns no peers.
    async fn find_peers(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        count: usize,
    ) -> Result<Vec<PeerRecord>, ExternalError>;

    /// Writes the comparative report.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] when required report sections
    /// are missing.
    async fn generate_insights(
        &self,
        ctx: &RunContext,
        profile: &DerivedProfile,
        peers: &[PeerRecord],
    ) -> Result<Report, ExternalError>;
}
