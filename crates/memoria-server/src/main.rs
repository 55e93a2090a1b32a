use std::net::SocketAddr;

use tracing::info;

mod app;
mod auth;
mod error;
mod http;
mod project;
mod telemetry;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoria_server=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("MEMORIA_CONFIG").ok();
    let config = memoria_core::config::MemoriaConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        memoria_core::config::MemoriaConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = app::AppState::new(config).await?;
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("memoria-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
