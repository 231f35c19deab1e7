use roteiro::Agent;
use std::sync::Arc;

/// Shared application state. The agent only holds immutable parts, so one instance
/// serves every request.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}
