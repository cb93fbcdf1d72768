//! Server state management.

use std::sync::Arc;

use vigil_core::config::VigilConfig;
use vigil_core::error::VigilResult;
use vigil_core::SignalEngine;

/// Shared application state.
///
/// The engine serializes its own writes, so handlers share it without a lock.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<SignalEngine>,
}

impl AppState {
    pub fn new(engine: SignalEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Open the engine described by `config`.
    pub fn from_config(config: VigilConfig) -> VigilResult<Self> {
        Ok(Self::new(SignalEngine::open(config)?))
    }

    /// State over a fresh in-memory engine.
    pub fn in_memory() -> Self {
        Self::new(SignalEngine::in_memory())
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }
}
