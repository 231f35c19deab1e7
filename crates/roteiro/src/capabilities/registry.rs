use std::collections::HashMap;
use std::sync::Arc;

use super::{
    Capability, MapsConfig, NearbyPlacesCapability, TrafficCapability, WeatherCapability,
};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

/// Maps capability names to their implementations. Filled once at startup, read-only after.
#[derive(Default)]
pub struct ToolRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    // registration order, so the model always sees declarations in the same order
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by the travel assistant: traffic, weather and nearby places
    pub fn travel(config: &MapsConfig) -> AgentResult<Self> {
        let mut registry = Self::new();
        registry.register(TrafficCapability::new(config.clone())?)?;
        registry.register(WeatherCapability::new())?;
        registry.register(NearbyPlacesCapability::new(config.clone())?)?;
        Ok(registry)
    }

    pub fn register(&mut self, capability: impl Capability + 'static) -> AgentResult<()> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(AgentError::DuplicateCapability(name));
        }
        self.order.push(name.clone());
        self.capabilities.insert(name, Arc::new(capability));
        Ok(())
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn declarations(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .map(|capability| capability.declaration().clone())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }
}
