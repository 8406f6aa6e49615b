use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// User-service routes for any signed-in account. The gate layered above this router
/// guarantees an `AuthenticatedIdentity` in every request; ownership ("same account
/// or admin") is then decided per handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // GET /users
        // Sanitized listing, never includes password digests.
        .route("/users", get(handlers::list_accounts))
        // GET/PUT/DELETE /users/{id}
        // Reads are open to any session; writes require ownership.
        .route(
            "/users/{id}",
            get(handlers::get_account)
                .put(handlers::update_profile)
                .delete(handlers::delete_account),
        )
        // PUT /users/{id}/password
        // Self only, current password re-verified.
        .route("/users/{id}/password", put(handlers::change_password))
}
