//! Request-scoped state threaded through one analysis run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cost::{CostEvent, CostLedger, CostSummary};
use crate::handle::Handle;

/// Identity of the user being analyzed plus the run's cost ledger.
///
/// Cloning is cheap and every clone records into the same ledger.
#[derive(Debug, Clone)]
pub struct RunContext {
    user_id: i64,
    handle: Handle,
    ledger: Arc<Mutex<CostLedger>>,
}

impl RunContext {
    #[must_use]
    pub fn new(user_id: i64, handle: Handle) -> Self {
        Self {
            user_id,
            handle,
            ledger: Arc::new(Mutex::new(CostLedger::new())),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn record_cost(&self, event: CostEvent) {
        self.lock().record(event);
    }

    /// A copy of the ledger as it stands now.
    #[must_use]
    pub fn ledger(&self) -> CostLedger {
        self.lock().clone()
    }

    #[must_use]
    pub fn cost_summary(&self) -> CostSummary {
        self.lock().summary()
    }

    // The ledger holds plain counters, so a panic mid-update cannot leave it
    // in a state worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, CostLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
