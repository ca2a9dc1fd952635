use catalog_config::Config;
use catalog_contracts::{CatalogStore, MessageBus};
use catalog_core::JobExecutor;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CatalogStore>,
    pub bus: Arc<dyn MessageBus>,
    pub executor: Arc<JobExecutor>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
