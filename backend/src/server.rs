use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    AppState, create_router,
    config::{AppConfig, ConfigError, Env, LOCAL_JWT_SECRET, ServiceKind},
    errors::AuthError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("service setup failed: {0}")]
    Setup(#[from] AuthError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// run
///
/// Entry point shared by both binaries: configuration, logging, state, HTTP server.
/// Configuration is loaded first so production refuses to start on a missing secret
/// before anything listens.
pub async fn run(service: ServiceKind) -> Result<(), ServerError> {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load(service)?;

    // 2. Logging, pretty locally and JSON in production
    init_tracing(config.env);
    tracing::info!(
        service = service.name(),
        "Application starting in {:?} mode",
        config.env
    );
    if config.jwt_secret == LOCAL_JWT_SECRET {
        tracing::warn!("JWT_SECRET not set, signing with the local development secret");
    }

    // 3. Unified State Assembly (hasher, codec, store, gate)
    let port = config.port;
    let state = AppState::build(config).await?;

    // 4. Router and Server Startup
    let app = create_router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!("Listening on 0.0.0.0:{}", port);
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(env: Env) {
    // RUST_LOG wins; otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portal_backend=debug,tower_http=info,axum=trace".into());

    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}
