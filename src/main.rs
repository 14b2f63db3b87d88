use anyhow::Result;
use tracing::info;

use mlguard_api::config::Config;
use mlguard_api::logging::init_tracing;
use mlguard_api::routes::build_app;
use mlguard_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let config = Config::discover()?;
    init_tracing(&config.system_config)?;
    config.validate()?;

    let addr = format!("{}:{}", config.system_config.host, config.system_config.port);
    info!(
        "Guard model: {}, model agent: {}, tool server: {}",
        config.guard_model(),
        config.model_agent_model(),
        config.mcp_config.url
    );

    let app_state = AppState::new(config)?;
    let app = build_app(app_state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
