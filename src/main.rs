//! AirSense server: loads model artifacts into the registry and
//! serves predictions over JSON REST.

use airsense::registry::ModelRegistry;
use airsense::stations::FeedClient;
use airsense::{config, create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airsense=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("AirSense server starting...");
    tracing::info!("Models folder: {}", config.models_dir);

    let registry = Arc::new(ModelRegistry::new(&config));
    if registry.load_all() == 0 {
        tracing::warn!("no models loaded; predict endpoints will answer 404 until a reload");
    }

    let state = AppState {
        registry,
        feed: Arc::new(FeedClient::new(&config)),
        config: config.clone(),
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
