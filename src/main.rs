use std::sync::Arc;

use agent_hire::agents::{agent_routes, AgentRouteState};
use agent_hire::config::ServerConfig;
use agent_hire::onboarding::{onboarding_routes, OnboardingRouteState, OnboardingService};
use agent_hire::store::{seed, LibSqlStore};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    eprintln!("🧑‍💼 Agent Hire v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}", config.port);
    eprintln!("   Database: {}", config.db_path);

    let store = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );

    if config.auto_seed {
        if let Some(agent_id) = seed::seed_agents(&store).await? {
            eprintln!("   Seeded default agent: {agent_id}");
        }
    }

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(onboarding_routes(OnboardingRouteState {
            service: Arc::new(OnboardingService::new(Arc::clone(&store))),
        }))
        .merge(agent_routes(AgentRouteState {
            store: Arc::clone(&store),
        }))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Server started");
    axum::serve(listener, app).await?;

    Ok(())
}
