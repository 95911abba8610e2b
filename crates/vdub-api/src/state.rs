//! Application state.

use vdub_worker::{Orchestrator, StatusBroadcaster, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: Orchestrator) -> Self {
        Self { config, orchestrator }
    }

    /// Build the orchestrator from the worker's environment configuration.
    pub fn from_env(config: ApiConfig) -> WorkerResult<Self> {
        let worker_config = WorkerConfig::from_env();
        let orchestrator = Orchestrator::from_config(worker_config, StatusBroadcaster::new())?;
        Ok(Self::new(config, orchestrator))
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        self.orchestrator.broadcaster()
    }
}
