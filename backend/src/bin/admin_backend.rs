use portal_backend::{ServiceKind, server::{self, ServerError}};

/// Admin backend: login for admin accounts and account management.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    server::run(ServiceKind::Admin).await
}
