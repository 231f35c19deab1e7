use serde::{Deserialize, Serialize};

use crate::capabilities::traffic::TRAFFIC_INFO;
use crate::capabilities::MapsConfig;
use crate::models::tool::{CapabilityResult, ToolCall};

/// Route endpoints and geometry accumulated over one conversation.
///
/// Origin and destination keep the first value seen so the map link stays stable, while
/// the polyline always follows the latest successful route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub polyline: Option<String>,
}

fn non_empty(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl RouteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record endpoints from a routing call, before it is dispatched
    pub fn observe_call(&mut self, call: &ToolCall) {
        if call.name != TRAFFIC_INFO {
            return;
        }
        if self.origin.is_none() {
            self.origin = non_empty(call.arguments.get("origin"));
        }
        if self.destination.is_none() {
            self.destination = non_empty(call.arguments.get("destination"));
        }
    }

    /// Record the polyline of a successful routing result
    pub fn observe_result(&mut self, name: &str, result: &CapabilityResult) {
        if name != TRAFFIC_INFO {
            return;
        }
        if let Ok(value) = result {
            if let Some(polyline) = non_empty(value.get("routePolyline")) {
                self.polyline = Some(polyline);
            }
        }
    }

    /// Directions link, when both endpoints are known
    pub fn map_url(&self, config: &MapsConfig) -> Option<String> {
        let origin = self.origin.as_deref()?;
        let destination = self.destination.as_deref()?;
        Some(format!(
            "{}/dir/{}/{}",
            config.map_base_url.trim_end_matches('/'),
            urlencoding::encode(origin),
            urlencoding::encode(destination)
        ))
    }

    /// Static map image of the route, when a polyline is known and a key is configured
    pub fn map_image_url(&self, config: &MapsConfig) -> Option<String> {
        let polyline = self.polyline.as_deref()?;
        let key = config.key()?;
        Some(format!(
            "{}?size=600x300&path=enc:{}&key={}",
            config.static_map_url,
            urlencoding::encode(polyline),
            urlencoding::encode(key)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use serde_json::json;

    fn route_call(origin: &str, destination: &str) -> ToolCall {
        ToolCall::new(
            TRAFFIC_INFO,
            json!({"origin": origin, "destination": destination}),
        )
    }

    #[test]
    fn test_endpoints_are_first_writer_wins() {
        let mut state = RouteState::new();
        state.observe_call(&route_call("Curitiba", "Londrina"));
        state.observe_call(&route_call("Maringá", "Cascavel"));

        assert_eq!(state.origin.as_deref(), Some("Curitiba"));
        assert_eq!(state.destination.as_deref(), Some("Londrina"));
    }

    #[test]
    fn test_missing_endpoint_can_be_filled_later() {
        let mut state = RouteState::new();
        state.observe_call(&ToolCall::new(TRAFFIC_INFO, json!({"origin": "Curitiba"})));
        state.observe_call(&route_call("Maringá", "Londrina"));

        assert_eq!(state.origin.as_deref(), Some("Curitiba"));
        assert_eq!(state.destination.as_deref(), Some("Londrina"));
    }

    #[test]
    fn test_other_capabilities_are_ignored() {
        let mut state = RouteState::new();
        state.observe_call(&ToolCall::new(
            "weatherInfo",
            json!({"origin": "Curitiba", "destination": "Londrina"}),
        ));
        state.observe_result("nearbyPlaces", &Ok(json!({"routePolyline": "xyz"})));
        assert_eq!(state, RouteState::default());
    }

    #[test]
    fn test_polyline_is_last_writer_wins() {
        let mut state = RouteState::new();
        state.observe_result(TRAFFIC_INFO, &Ok(json!({"routePolyline": "first"})));
        state.observe_result(TRAFFIC_INFO, &Ok(json!({"routePolyline": "second"})));
        state.observe_result(TRAFFIC_INFO, &Ok(json!({"summary": "no route"})));
        state.observe_result(
            TRAFFIC_INFO,
            &Err(AgentError::ExecutionError("boom".into())),
        );
        assert_eq!(state.polyline.as_deref(), Some("second"));
    }

    #[test]
    fn test_map_url_encodes_locations() {
        let mut state = RouteState::new();
        assert_eq!(state.map_url(&MapsConfig::default()), None);

        state.observe_call(&route_call("São Paulo", "Foz do Iguaçu"));
        assert_eq!(
            state.map_url(&MapsConfig::default()).unwrap(),
            "https://www.google.com/maps/dir/S%C3%A3o%20Paulo/Foz%20do%20Igua%C3%A7u"
        );
    }

    #[test]
    fn test_map_image_url_needs_polyline_and_key() {
        let mut state = RouteState::new();
        let config = MapsConfig::default().with_api_key("static-key");
        assert_eq!(state.map_image_url(&config), None);

        state.observe_result(TRAFFIC_INFO, &Ok(json!({"routePolyline": "abcDEF"})));
        assert_eq!(state.map_image_url(&MapsConfig::default()), None);
        assert_eq!(
            state.map_image_url(&config).unwrap(),
            "https://maps.googleapis.com/maps/api/staticmap?size=600x300&path=enc:abcDEF&key=static-key"
        );
    }
}
