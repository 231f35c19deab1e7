mod configuration;
mod error;
mod routes;
mod state;

use anyhow::Result;
use roteiro::capabilities::ToolRegistry;
use roteiro::providers::factory;
use roteiro::Agent;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = configuration::Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let provider = factory::get_provider(settings.provider.into_config())?;
    let maps = settings.maps;
    if maps.key().is_none() {
        tracing::warn!("no maps api key configured, route and places lookups report no data");
    }
    let registry = ToolRegistry::travel(&maps)?;
    tracing::info!(capabilities = ?registry.names(), "registered capabilities");

    let agent = Agent::new(provider, registry, maps);
    let state = state::AppState::new(agent);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
