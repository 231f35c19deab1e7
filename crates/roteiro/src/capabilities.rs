//! Capability modules the agent can call, and the registry that dispatches them by name.
//!
//! Every capability owns its declaration (name, description, input and output schema) and
//! validates at its boundary: arguments are decoded into a typed input struct and the typed
//! output is encoded back to JSON, so a success value always matches the declared output.
//! Backend trouble is absorbed into each module's own "no data" output; only malformed
//! arguments come back as errors.
pub mod config;
pub mod places;
pub mod registry;
pub mod traffic;
pub mod weather;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{CapabilityResult, Tool};

pub use config::MapsConfig;
pub use places::NearbyPlacesCapability;
pub use registry::ToolRegistry;
pub use traffic::TrafficCapability;
pub use weather::WeatherCapability;

/// An externally backed operation the model may invoke
#[async_trait]
pub trait Capability: Send + Sync {
    /// The immutable declaration offered to the model
    fn declaration(&self) -> &Tool;

    /// Run the capability with model-provided arguments
    async fn call(&self, arguments: Value) -> CapabilityResult;

    fn name(&self) -> &str {
        &self.declaration().name
    }
}

/// Decode model arguments into the capability's typed input
pub(crate) fn parse_input<T: DeserializeOwned>(name: &str, arguments: Value) -> AgentResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::InvalidParameters(format!("{}: {}", name, e)))
}

/// Encode a typed output into the value handed back to the model
pub(crate) fn to_output<T: Serialize>(output: &T) -> CapabilityResult {
    serde_json::to_value(output).map_err(|e| AgentError::Internal(e.to_string()))
}

pub(crate) fn http_client(timeout_secs: u64) -> AgentResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Internal(format!("failed to build http client: {}", e)))
}
