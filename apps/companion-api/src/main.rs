use std::net::SocketAddr;

use anyhow::Result;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use companion_api::config::AppConfig;
use companion_api::routes;
use companion_api::state::AppState;

/// Limite de requisições simultâneas atendidas pelo serviço
const MAX_IN_FLIGHT_REQUESTS: usize = 512;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("companion_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::load()?;
    let state = AppState::init(&config).await?;

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Servidor escutando em {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
