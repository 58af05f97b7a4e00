use std::sync::Arc;

use crate::config::Config;
use crate::ledger::JobStatusStore;
use crate::observability::Metrics;
use crate::queue::MessageBus;
use crate::storage::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub ledger: Arc<dyn JobStatusStore>,
    pub bus: Arc<dyn MessageBus>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        ledger: Arc<dyn JobStatusStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            ledger,
            bus,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
