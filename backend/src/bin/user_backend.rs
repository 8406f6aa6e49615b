use portal_backend::{ServiceKind, server::{self, ServerError}};

/// User backend: registration, login and self-service account routes.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    server::run(ServiceKind::User).await
}
