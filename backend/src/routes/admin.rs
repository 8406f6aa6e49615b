use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Admin Router Module
///
/// Every admin-service route behind the login. The router is wrapped in a gate that
/// requires `role = admin` inside the token, so handlers here never re-check the role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // GET/POST /users
        // Account management: full listing and creation with any role.
        .route(
            "/users",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        // GET/PUT/DELETE /users/{id}
        .route(
            "/users/{id}",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
}
