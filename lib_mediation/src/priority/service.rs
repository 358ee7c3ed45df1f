use std::sync::Arc;
use std::time::Duration;

use super::dashboard::DashboardAggregator;
use super::selection::SelectionEngine;
use super::store::PriorityStore;
use super::upsert::UpsertEngine;

/// # Mediation Service
///
/// The engines over one injected store, all bounded by the same timeout.
/// This is what the HTTP layer holds as its state.
pub struct MediationService<S> {
    pub upsert: UpsertEngine<S>,
    pub selection: SelectionEngine<S>,
    pub dashboard: DashboardAggregator<S>,
}

impl<S: PriorityStore> MediationService<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self {
            upsert: UpsertEngine::new(Arc::clone(&store), timeout),
            selection: SelectionEngine::new(Arc::clone(&store), timeout),
            dashboard: DashboardAggregator::new(store, timeout),
        }
    }
}
