use std::sync::Arc;

use strata_registry::Registry;

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}
