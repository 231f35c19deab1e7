use anyhow::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::capabilities::{MapsConfig, ToolRegistry};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::models::outcome::AgentOutcome;
use crate::models::tool::{CapabilityResult, ToolCall};
use crate::prompt_template::system_prompt;
use crate::providers::base::Provider;
use crate::route_state::RouteState;

/// Upper bound on model rounds for a single query
pub const MAX_ITERATIONS: usize = 5;

pub const FALLBACK_TEXT: &str =
    "I could not reach a final answer for your request. Please try rephrasing it.";
pub const PROVIDER_ERROR_TEXT: &str =
    "Sorry, I had trouble reaching the travel assistant. Please try again in a moment.";
pub const EMPTY_QUERY_TEXT: &str =
    "Please tell me about your trip: where you are leaving from and where you are going.";

// Name used for responses to calls the model got wrong (bad name or unparseable arguments)
const INVALID_CALL: &str = "invalid_call";

/// Agent drives a model through rounds of capability calls until it produces an answer
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: Arc<ToolRegistry>,
    maps: MapsConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry, maps: MapsConfig) -> Self {
        Self {
            provider,
            registry: Arc::new(registry),
            maps,
        }
    }

    /// Answer a travel question. Never fails: every problem ends up in the outcome's text.
    pub async fn ask(&self, query: &str) -> AgentOutcome {
        if query.trim().is_empty() {
            return AgentOutcome::text(EMPTY_QUERY_TEXT);
        }

        let mut route = RouteState::new();
        let text = match self.run(query, &mut route).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::warn!(max = MAX_ITERATIONS, "no final answer within the round budget");
                FALLBACK_TEXT.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "agent run failed");
                PROVIDER_ERROR_TEXT.to_string()
            }
        };

        AgentOutcome {
            text,
            map_url: route.map_url(&self.maps),
            map_image_url: route.map_image_url(&self.maps),
        }
    }

    /// The loop itself. `Ok(None)` means the round budget ran out.
    async fn run(&self, query: &str, route: &mut RouteState) -> Result<Option<String>> {
        let tools = self.registry.declarations();
        let system_prompt = system_prompt(&tools)?;
        let mut messages = vec![Message::user().with_text(query)];

        for round in 1..=MAX_ITERATIONS {
            let (response, usage) = self
                .provider
                .complete(&system_prompt, &messages, &tools)
                .await?;

            let requests: Vec<ToolRequest> =
                response.tool_requests().into_iter().cloned().collect();
            let text = response.text();
            messages.push(response);

            tracing::info!(
                round,
                requests = requests.len(),
                total_tokens = ?usage.total_tokens,
                "model round"
            );

            if requests.is_empty() {
                return Ok(Some(text));
            }

            // Endpoints are taken from the arguments, before any call runs
            for request in &requests {
                if let Ok(call) = &request.tool_call {
                    route.observe_call(call);
                }
            }

            let futures: Vec<_> = requests
                .iter()
                .map(|request| self.dispatch_tool_call(request.tool_call.clone()))
                .collect();
            let outputs = futures::future::join_all(futures).await;

            let mut message_tool_response = Message::tool();
            for (request, output) in requests.iter().zip(outputs.into_iter()) {
                let name = request.name().unwrap_or(INVALID_CALL);
                route.observe_result(name, &output);
                message_tool_response =
                    message_tool_response.with_tool_response(request.id.clone(), name, output);
            }
            messages.push(message_tool_response);
        }

        Ok(None)
    }

    /// Dispatch a single capability call. Whatever happens, the call gets exactly one result.
    async fn dispatch_tool_call(&self, tool_call: AgentResult<ToolCall>) -> CapabilityResult {
        let call = tool_call?;
        let capability = self
            .registry
            .lookup(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let result = AssertUnwindSafe(capability.call(call.arguments))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(AgentError::ExecutionError(format!(
                    "capability {} panicked",
                    call.name
                )))
            });

        match &result {
            Ok(_) => tracing::debug!(capability = %call.name, "capability call succeeded"),
            Err(e) => tracing::warn!(capability = %call.name, error = %e, "capability call failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::traffic::TRAFFIC_INFO;
    use crate::capabilities::{Capability, WeatherCapability};
    use crate::models::message::MessageContent;
    use crate::models::role::Role;
    use crate::models::tool::Tool;
    use crate::providers::mock::MockProvider;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Routing stand-in: the polyline names the origin it was computed for
    struct StubTraffic {
        tool: Tool,
    }

    impl StubTraffic {
        fn new() -> Self {
            Self {
                tool: Tool::new(TRAFFIC_INFO, "stub route", json!({}), json!({})),
            }
        }
    }

    #[async_trait]
    impl Capability for StubTraffic {
        fn declaration(&self) -> &Tool {
            &self.tool
        }

        async fn call(&self, arguments: Value) -> CapabilityResult {
            let origin = arguments["origin"].as_str().unwrap_or_default();
            Ok(json!({
                "travelTime": "5 h 30 min",
                "distance": "381.2 km",
                "summary": "stub",
                "tollCost": 15.5,
                "tollCount": 2,
                "routePolyline": format!("poly{}", origin)
            }))
        }
    }

    struct Failing {
        tool: Tool,
        panic: bool,
    }

    impl Failing {
        fn new(name: &str, panic: bool) -> Self {
            Self {
                tool: Tool::new(name, "always fails", json!({}), json!({})),
                panic,
            }
        }
    }

    #[async_trait]
    impl Capability for Failing {
        fn declaration(&self) -> &Tool {
            &self.tool
        }

        async fn call(&self, _arguments: Value) -> CapabilityResult {
            if self.panic {
                panic!("backend exploded");
            }
            Err(AgentError::ExecutionError("backend exploded".into()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(StubTraffic::new()).unwrap();
        registry.register(WeatherCapability::new()).unwrap();
        registry.register(Failing::new("brokenInfo", false)).unwrap();
        registry.register(Failing::new("panickyInfo", true)).unwrap();
        registry
    }

    fn route_request(id: &str, origin: &str, destination: &str) -> Message {
        Message::assistant().with_tool_request(
            id,
            Ok(ToolCall::new(
                TRAFFIC_INFO,
                json!({"origin": origin, "destination": destination}),
            )),
        )
    }

    fn agent_with(provider: MockProvider, maps: MapsConfig) -> Agent {
        Agent::new(Box::new(provider), registry(), maps)
    }

    /// Tool responses of the last message the provider saw on the given round
    fn responses_seen(calls: &[Vec<Message>], round: usize) -> Vec<(String, CapabilityResult)> {
        let last = calls[round].last().unwrap();
        assert_eq!(last.role, Role::Tool);
        last.content
            .iter()
            .filter_map(|c| c.as_tool_response())
            .map(|r| (r.name.clone(), r.tool_result.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_direct_answer_ends_on_first_round() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Boa viagem!")]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Vale a pena ir a Londrina?").await;

        assert_eq!(outcome, AgentOutcome::text("Boa viagem!"));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_round_budget_is_enforced() {
        let responses = (0..MAX_ITERATIONS + 2)
            .map(|i| {
                Message::assistant().with_tool_request(
                    i.to_string(),
                    Ok(ToolCall::new("weatherInfo", json!({"location": "Curitiba"}))),
                )
            })
            .collect();
        let provider = MockProvider::new(responses);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Weather forever").await;

        assert_eq!(outcome.text, FALLBACK_TEXT);
        assert_eq!(calls.lock().unwrap().len(), MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_route_produces_map_artifacts() {
        let provider = MockProvider::new(vec![
            route_request("1", "Curitiba", "Londrina"),
            Message::assistant().with_text("About 5 h 30 min with R$ 15,50 in tolls."),
        ]);
        let maps = MapsConfig::default().with_api_key("static-key");
        let agent = agent_with(provider, maps);

        let outcome = agent.ask("Curitiba to Londrina?").await;

        assert_eq!(outcome.text, "About 5 h 30 min with R$ 15,50 in tolls.");
        let map_url = outcome.map_url.unwrap();
        assert!(map_url.contains("/dir/Curitiba/Londrina"));
        let image_url = outcome.map_image_url.unwrap();
        assert!(image_url.contains("path=enc:polyCuritiba"));
        assert!(image_url.ends_with("key=static-key"));
    }

    #[tokio::test]
    async fn test_map_image_requires_key() {
        let provider = MockProvider::new(vec![
            route_request("1", "Curitiba", "Londrina"),
            Message::assistant().with_text("done"),
        ]);
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Curitiba to Londrina?").await;

        assert!(outcome.map_url.is_some());
        assert_eq!(outcome.map_image_url, None);
    }

    #[tokio::test]
    async fn test_first_route_endpoints_win_but_latest_polyline_is_kept() {
        let provider = MockProvider::new(vec![
            route_request("1", "Curitiba", "Londrina"),
            route_request("2", "Cascavel", "Maringa"),
            Message::assistant().with_text("done"),
        ]);
        let maps = MapsConfig::default().with_api_key("k");
        let agent = agent_with(provider, maps);

        let outcome = agent.ask("Which route?").await;

        assert_eq!(
            outcome.map_url.as_deref(),
            Some("https://www.google.com/maps/dir/Curitiba/Londrina")
        );
        assert!(outcome.map_image_url.unwrap().contains("enc:polyCascavel"));
    }

    #[tokio::test]
    async fn test_failing_capability_does_not_affect_siblings() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("brokenInfo", json!({}))))
                .with_tool_request(
                    "2",
                    Ok(ToolCall::new("weatherInfo", json!({"location": "Londrina"}))),
                )
                .with_tool_request("3", Ok(ToolCall::new("panickyInfo", json!({})))),
            Message::assistant().with_text("Partial answer"),
        ]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Weather and more").await;
        assert_eq!(outcome.text, "Partial answer");

        let calls = calls.lock().unwrap();
        let responses = responses_seen(&calls, 1);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].0, "brokenInfo");
        assert!(matches!(responses[0].1, Err(AgentError::ExecutionError(_))));
        assert_eq!(responses[1].0, "weatherInfo");
        assert_eq!(responses[1].1.as_ref().unwrap()["temperature"], "27°C");
        assert_eq!(
            responses[2].1,
            Err(AgentError::ExecutionError("capability panickyInfo panicked".into()))
        );
    }

    #[tokio::test]
    async fn test_unknown_capability_yields_error_result() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("1", Ok(ToolCall::new("flightInfo", json!({})))),
            Message::assistant().with_text("No flights, sorry."),
        ]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Flights to Londrina?").await;
        assert_eq!(outcome.text, "No flights, sorry.");

        let calls = calls.lock().unwrap();
        let responses = responses_seen(&calls, 1);
        assert_eq!(
            crate::models::tool::result_to_value(&responses[0].1),
            json!({"error": "capability flightInfo not found"})
        );
    }

    #[tokio::test]
    async fn test_unusable_tool_name_is_answered_as_unknown() {
        let response = crate::providers::utils::openai_response_to_message(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "flight info", "arguments": "{}"}
                    }]
                }
            }]
        }))
        .unwrap();
        let provider = MockProvider::new(vec![response, Message::assistant().with_text("ok")]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        agent.ask("Flights?").await;

        let calls = calls.lock().unwrap();
        let responses = responses_seen(&calls, 1);
        assert_eq!(responses[0].0, "flight info");
        assert_eq!(
            crate::models::tool::result_to_value(&responses[0].1),
            json!({"error": "capability flight info not found"})
        );
    }

    /// Waits at a barrier shared with its siblings, so it only returns once they all run
    struct Gate {
        tool: Tool,
        barrier: Arc<tokio::sync::Barrier>,
    }

    #[async_trait]
    impl Capability for Gate {
        fn declaration(&self) -> &Tool {
            &self.tool
        }

        async fn call(&self, _arguments: Value) -> CapabilityResult {
            self.barrier.wait().await;
            Ok(json!({"passed": self.tool.name}))
        }
    }

    #[tokio::test]
    async fn test_calls_in_a_round_run_concurrently() {
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let mut registry = ToolRegistry::new();
        for name in ["northGate", "southGate"] {
            registry
                .register(Gate {
                    tool: Tool::new(name, "waits for its sibling", json!({}), json!({})),
                    barrier: barrier.clone(),
                })
                .unwrap();
        }
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("northGate", json!({}))))
                .with_tool_request("2", Ok(ToolCall::new("southGate", json!({})))),
            Message::assistant().with_text("both passed"),
        ]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider), registry, MapsConfig::default());

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), agent.ask("go"))
            .await
            .expect("calls of one round must not wait on each other");

        assert_eq!(outcome.text, "both passed");
        let calls = calls.lock().unwrap();
        let responses = responses_seen(&calls, 1);
        assert_eq!(responses[0].1, Ok(json!({"passed": "northGate"})));
        assert_eq!(responses[1].1, Ok(json!({"passed": "southGate"})));
    }

    #[tokio::test]
    async fn test_malformed_call_is_answered_with_its_error() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Err(AgentError::InvalidParameters("bad arguments".into())),
            ),
            Message::assistant().with_text("ok"),
        ]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        agent.ask("anything").await;

        let calls = calls.lock().unwrap();
        let responses = responses_seen(&calls, 1);
        assert_eq!(responses[0].0, INVALID_CALL);
        assert_eq!(
            responses[0].1,
            Err(AgentError::InvalidParameters("bad arguments".into()))
        );
    }

    #[tokio::test]
    async fn test_conversation_shape() {
        let provider = MockProvider::new(vec![
            route_request("1", "Curitiba", "Londrina"),
            Message::assistant().with_text("done"),
        ]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        agent.ask("Curitiba to Londrina?").await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[0][0].role, Role::User);
        let roles: Vec<Role> = calls[1].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        match &calls[1][2].content[0] {
            MessageContent::ToolResponse(response) => {
                assert_eq!(response.id, "1");
                assert_eq!(response.name, TRAFFIC_INFO);
            }
            other => panic!("expected tool response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_apology() {
        let provider = MockProvider::with_results(vec![
            Ok(route_request("1", "Curitiba", "Londrina")),
            Err(anyhow!("connection reset")),
        ]);
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("Curitiba to Londrina?").await;

        assert_eq!(outcome.text, PROVIDER_ERROR_TEXT);
        assert!(outcome.map_url.is_some());
    }

    #[tokio::test]
    async fn test_blank_query_skips_the_model() {
        let provider = MockProvider::new(vec![]);
        let calls = provider.calls();
        let agent = agent_with(provider, MapsConfig::default());

        let outcome = agent.ask("   ").await;

        assert_eq!(outcome, AgentOutcome::text(EMPTY_QUERY_TEXT));
        assert!(calls.lock().unwrap().is_empty());
    }
}
