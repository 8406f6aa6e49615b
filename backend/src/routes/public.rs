use crate::{AppState, config::ServiceKind, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Login exists on both services;
/// self-registration only on the user service.
pub fn public_routes(service: ServiceKind) -> Router<AppState> {
    let router = Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Service banner (name, version, status).
        .route("/", get(handlers::service_info))
        // POST /auth/login
        // Username + password in, signed session token out.
        .route("/auth/login", post(handlers::login));

    match service {
        // POST /auth/register
        // Creates a `user` account and returns a session like login does.
        ServiceKind::User => router.route("/auth/register", post(handlers::register)),
        ServiceKind::Admin => router,
    }
}
