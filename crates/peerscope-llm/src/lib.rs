//! Language-model collaborator: an xAI Grok chat client, repair of the
//! model's JSON output, and [`GrokGrowthModel`], which implements
//! [`peerscope_core::GrowthModel`] on top of them.

pub mod client;
pub mod model;
pub mod prompts;
pub mod repair;

pub use client::{ChatMessage, Completion, GrokClient, DEFAULT_BASE_URL, DEFAULT_MODEL, TARGET};
pub use model::GrokGrowthModel;
pub use repair::{clean_json_text, repair_json};
