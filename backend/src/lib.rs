use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// The authorization core: hashing, tokens, sessions, the gate.
pub mod auth;
pub mod password;
pub mod session;
pub mod token;

// Credential store, shared types and HTTP surface.
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod server;

// Routing segregated by required access (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthenticatedIdentity, AuthorizationGate};
pub use config::{AppConfig, Env, ServiceKind};
pub use errors::AuthError;
pub use repository::{CredentialStore, InMemoryCredentialStore, StoreState};

use models::{NewAccount, Role};
use password::PasswordHasher;
use session::SessionIssuer;
use token::{SESSION_TTL, TokenCodec};

/// UserApiDoc
///
/// OpenAPI document of the user service, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::service_info, handlers::login, handlers::register, handlers::get_me,
        handlers::list_accounts, handlers::get_account, handlers::update_profile,
        handlers::delete_account, handlers::change_password
    ),
    components(
        schemas(
            models::Role, models::AccountView, models::LoginRequest, models::LoginResponse,
            models::RegisterRequest, models::UpdateProfileRequest, models::ChangePasswordRequest,
            models::ServiceInfo,
        )
    ),
    tags(
        (name = "user-backend", description = "User-facing account API")
    )
)]
struct UserApiDoc;

/// AdminApiDoc
///
/// OpenAPI document of the admin service.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::service_info, handlers::login, handlers::get_me, handlers::list_accounts,
        handlers::create_account, handlers::get_account, handlers::update_account,
        handlers::delete_account
    ),
    components(
        schemas(
            models::Role, models::AccountView, models::LoginRequest, models::LoginResponse,
            models::CreateAccountRequest, models::UpdateAccountRequest, models::ServiceInfo,
        )
    ),
    tags(
        (name = "admin-backend", description = "Administration API")
    )
)]
struct AdminApiDoc;

/// AppState
///
/// Everything a request of one service may touch. Cloning is cheap: all members are
/// shared handles, and none of them is mutated after startup except through the
/// credential store's own locking.
#[derive(Clone)]
pub struct AppState {
    /// Credential store behind the `CredentialStore` trait.
    pub store: StoreState,
    /// Login and registration.
    pub sessions: Arc<SessionIssuer>,
    /// Shared with the session issuer; used directly by password-changing handlers.
    pub hasher: Arc<PasswordHasher>,
    /// The service's single authorization gate.
    pub gate: AuthorizationGate,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// build
    ///
    /// Wires the service from its configuration with an in-memory credential store.
    pub async fn build(config: AppConfig) -> Result<Self, AuthError> {
        Self::with_store(config, Arc::new(InMemoryCredentialStore::new())).await
    }

    /// with_store
    ///
    /// Same as [`AppState::build`] with a caller-provided store. Seeds the service's
    /// demo account when a seed password is configured.
    pub async fn with_store(config: AppConfig, store: StoreState) -> Result<Self, AuthError> {
        let cost = config.hash_cost;
        let hasher = Arc::new(password::run_blocking(move || PasswordHasher::new(cost)).await??);

        // Tokens name the issuing service, so one service never accepts the other's.
        let codec = Arc::new(
            TokenCodec::new(&config.jwt_secret, SESSION_TTL).with_audience(config.service.name()),
        );

        let (gate, embed_role) = match config.service {
            ServiceKind::Admin => (AuthorizationGate::requiring(codec.clone(), Role::Admin), true),
            ServiceKind::User => (AuthorizationGate::authenticated(codec.clone()), false),
        };

        if let Some(seed_password) = &config.seed_password {
            let seed = seed_account(config.service);
            let password_hash = password::hash_blocking(hasher.clone(), seed_password.clone()).await?;
            store
                .insert(NewAccount {
                    password_hash,
                    ..seed
                })
                .await?;
            tracing::info!(service = config.service.name(), "seeded demo account");
        }

        let sessions = Arc::new(SessionIssuer::new(
            store.clone(),
            hasher.clone(),
            codec,
            embed_role,
        ));

        Ok(Self {
            store,
            sessions,
            hasher,
            gate,
            config,
        })
    }
}

fn seed_account(service: ServiceKind) -> NewAccount {
    match service {
        ServiceKind::Admin => NewAccount {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Admin,
        },
        ServiceKind::User => NewAccount {
            username: "user1".to_string(),
            email: "user1@example.com".to_string(),
            password_hash: String::new(),
            role: Role::User,
        },
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AuthorizationGate {
    fn from_ref(app_state: &AppState) -> AuthorizationGate {
        app_state.gate.clone()
    }
}

/// create_router
///
/// Assembles the routes of the service named in the state's configuration, installs
/// the authorization gate once over the protected router, and wraps everything in the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration (the admin SPA is served from another origin)
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let service = state.config.service;
    let (protected, openapi) = match service {
        ServiceKind::Admin => (admin::admin_routes(), AdminApiDoc::openapi()),
        ServiceKind::User => (authenticated::authenticated_routes(), UserApiDoc::openapi()),
    };

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .merge(public::public_routes(service))
        // The gate runs before every protected handler. It is the only token check.
        .merge(protected.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        )))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by `x-request-id`. Never records the
/// `Authorization` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
