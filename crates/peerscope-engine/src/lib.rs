//! Cache, pool and orchestration engine for peerscope.
//!
//! Every component reads and writes through [`AnalysisStore`], so the same
//! decision logic runs against Postgres ([`PgStore`]) or memory
//! ([`MemoryStore`]). Time comes from a [`Clock`] for the same reason.

pub mod clock;
pub mod error;
pub mod orchestrator;
pub mod peer_pool;
pub mod profile_cache;
pub mod store;
pub mod tweet_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome, OrchestratorSettings, PeerSource};
pub use peer_pool::{PeerPool, PeerPoolSettings};
pub use profile_cache::{ProfileCache, ProfileCacheSettings};
pub use store::{
    AnalysisRecord, AnalysisStore, MemoryStore, NewAnalysisRecord, NewProfileRecord, PgStore,
    PoolCounts, PoolEntryUpsert, TweetCacheCounts, TweetCacheEntry, UserAccount,
};
pub use tweet_cache::{TweetCache, TweetCacheStats};
