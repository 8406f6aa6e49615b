use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthenticatedIdentity,
    config::AppConfig,
    errors::AuthError,
    extract::ApiJson,
    models::{
        AccountChanges, AccountId, AccountView, ChangePasswordRequest, CreateAccountRequest,
        LoginRequest, LoginResponse, NewAccount, RegisterRequest, ServiceInfo,
        UpdateAccountRequest, UpdateProfileRequest, require_fields,
    },
    password,
    repository::StoreState,
    session::Session,
};

fn login_response(message: &str, session: Session, expires_in: u64) -> LoginResponse {
    LoginResponse {
        message: message.to_string(),
        token: session.token,
        expires_in,
        account: session.account,
    }
}

/// Rejects `Some("")`: an optional field that is present must carry a value.
fn reject_blank(field: &str, value: Option<&String>) -> Result<(), AuthError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(AuthError::InvalidRequest(format!("{field} must not be empty")))
        }
        _ => Ok(()),
    }
}

// --- Public Handlers ---

/// service_info
///
/// [Public Route] Service banner, used by the SPA to check which backend it reached.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = ServiceInfo))
)]
pub async fn service_info(State(config): State<AppConfig>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: format!("{} API", config.service.name()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

/// login
///
/// [Public Route] Exchanges a username and password for a session token.
///
/// *Security*: unknown usernames and wrong passwords produce the same 401 body.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let session = state
        .sessions
        .login(&payload.username, &payload.password)
        .await?;
    let expires_in = state.sessions.token_ttl_secs();
    Ok(Json(login_response("login succeeded", session, expires_in)))
}

/// register
///
/// [Public Route, user service] Creates an account and signs it in.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = LoginResponse),
        (status = 400, description = "Duplicate username or email, or missing fields")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AuthError> {
    let session = state.sessions.register(payload).await?;
    let expires_in = state.sessions.token_ttl_secs();
    Ok((
        StatusCode::CREATED,
        Json(login_response("registration succeeded", session, expires_in)),
    ))
}

// --- Authenticated Handlers (both services) ---

/// get_me
///
/// [Authenticated Route] Current account, read fresh from the store. A token that
/// outlived its account yields 404.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current account", body = AccountView),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Account no longer exists")
    )
)]
pub async fn get_me(
    identity: AuthenticatedIdentity,
    State(store): State<StoreState>,
) -> Result<Json<AccountView>, AuthError> {
    let account = store
        .find_by_id(identity.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(AccountView::from(&account)))
}

#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All accounts", body = [AccountView]))
)]
pub async fn list_accounts(State(store): State<StoreState>) -> Result<Json<Vec<AccountView>>, AuthError> {
    let accounts = store.list().await?;
    Ok(Json(accounts.iter().map(AccountView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Found", body = AccountView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_account(
    State(store): State<StoreState>,
    Path(id): Path<AccountId>,
) -> Result<Json<AccountView>, AuthError> {
    let account = store
        .find_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(AccountView::from(&account)))
}

/// delete_account
///
/// [Authenticated Route] Removes an account. On the user service only the account
/// itself may do this; on the admin service the gate has already required an admin.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_account(
    identity: AuthenticatedIdentity,
    State(store): State<StoreState>,
    Path(id): Path<AccountId>,
) -> Result<StatusCode, AuthError> {
    if !identity.can_manage(id) {
        return Err(AuthError::InsufficientRole);
    }

    if store.delete(id).await? {
        tracing::info!(account_id = id, by = identity.id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::AccountNotFound)
    }
}

// --- User Service Handlers ---

/// update_profile
///
/// [Authenticated Route] Changes the email of an account. Owner or admin only.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = AccountView),
        (status = 400, description = "Email taken"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn update_profile(
    identity: AuthenticatedIdentity,
    State(store): State<StoreState>,
    Path(id): Path<AccountId>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<AccountView>, AuthError> {
    if !identity.can_manage(id) {
        return Err(AuthError::InsufficientRole);
    }
    reject_blank("email", payload.email.as_ref())?;

    let changes = AccountChanges {
        email: payload.email,
        ..AccountChanges::default()
    };
    let account = store.update(id, changes).await?;
    Ok(Json(AccountView::from(&account)))
}

/// change_password
///
/// [Authenticated Route] Self-service password change. The current password is
/// re-verified even though the caller holds a valid token.
#[utoipa::path(
    put,
    path = "/users/{id}/password",
    params(("id" = i64, Path, description = "Account ID")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password wrong"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn change_password(
    identity: AuthenticatedIdentity,
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, AuthError> {
    if identity.id != id {
        return Err(AuthError::InsufficientRole);
    }
    require_fields(&[("new_password", payload.new_password.as_str())])?;

    let account = state
        .store
        .find_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let matched = password::verify_blocking(
        state.hasher.clone(),
        payload.current_password,
        Some(account.password_hash),
    )
    .await?;
    if !matched {
        return Err(AuthError::InvalidCredentials);
    }

    let password_hash = password::hash_blocking(state.hasher.clone(), payload.new_password).await?;
    let changes = AccountChanges {
        password_hash: Some(password_hash),
        ..AccountChanges::default()
    };
    state.store.update(id, changes).await?;

    tracing::info!(account_id = id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Service Handlers ---

/// create_account
///
/// [Admin Route] Creates an account with any role.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Created", body = AccountView),
        (status = 400, description = "Duplicate username or email, or missing fields"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), AuthError> {
    require_fields(&[
        ("username", payload.username.as_str()),
        ("email", payload.email.as_str()),
        ("password", payload.password.as_str()),
    ])?;

    let password_hash = password::hash_blocking(state.hasher.clone(), payload.password).await?;
    let account = state
        .store
        .insert(NewAccount {
            username: payload.username,
            email: payload.email,
            password_hash,
            role: payload.role.unwrap_or_default(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

/// update_account
///
/// [Admin Route] Partial update of any account. A role change applies to tokens issued
/// afterwards; sessions already issued keep the old role until they expire.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = AccountView),
        (status = 400, description = "Username or email taken"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> Result<Json<AccountView>, AuthError> {
    reject_blank("username", payload.username.as_ref())?;
    reject_blank("email", payload.email.as_ref())?;
    reject_blank("password", payload.password.as_ref())?;

    let password_hash = match payload.password {
        Some(plaintext) => Some(password::hash_blocking(state.hasher.clone(), plaintext).await?),
        None => None,
    };

    let changes = AccountChanges {
        username: payload.username,
        email: payload.email,
        password_hash,
        role: payload.role,
    };
    let account = state.store.update(id, changes).await?;
    Ok(Json(AccountView::from(&account)))
}
