use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use roteiro::AgentOutcome;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
}

// Runs one agent loop per request; the outcome is always well formed, so this never fails
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Json<AgentOutcome> {
    tracing::info!(query_len = request.query.len(), "ask");
    Json(state.agent.ask(&request.query).await)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/ask", post(ask_handler))
        .with_state(state)
}
