//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use essaycast_core::Orchestrator;

use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Owns the task store and runs every generation.
    pub orchestrator: Orchestrator,
}
