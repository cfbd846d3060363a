//! Resilient JSON-over-HTTP caller shared by the social-data and
//! language-model clients.
//!
//! [`ExternalCallClient`] classifies every response into the
//! [`peerscope_core::ExternalError`] taxonomy and retries rate limits and
//! timeouts in an explicit bounded loop governed by a [`RetryPolicy`].

pub mod client;
pub mod policy;
pub mod retry;

pub use client::{truncate_for_log, AuthHeader, ExternalCallClient};
pub use policy::{Backoff, RetryPolicy};
pub use retry::call_with_retry;
