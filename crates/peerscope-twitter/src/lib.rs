//! Client for the twitterapi.io social-data API.
//!
//! [`TwitterApiClient`] implements [`peerscope_core::SocialDataSource`]:
//! account lookup and recent original posts, with every billable call
//! recorded on the run's cost ledger.

pub mod client;
pub mod types;

pub use client::{TwitterApiClient, DEFAULT_BASE_URL, MAX_POSTS_PER_CALL, TARGET};
