use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{repository::StoreError, token::TokenError};

/// Single message for every 401. Callers never learn which check failed.
pub const UNAUTHENTICATED_MESSAGE: &str = "authentication failed";

/// AuthError
///
/// Every failure the session issuer, the authorization gate and the account handlers
/// can report. Expected failures become a structured response; only `Internal` stands
/// for something that should not happen, and its detail is logged but never returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("no bearer token presented")]
    MissingToken,
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("account not found")]
    AccountNotFound,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::DuplicateUsername
            | AuthError::DuplicateEmail
            | AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::AccountNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(detail) => {
                tracing::error!(%detail, "request failed with an internal error");
                "internal server error".to_string()
            }
            _ if status == StatusCode::UNAUTHORIZED => UNAUTHENTICATED_MESSAGE.to_string(),
            AuthError::InsufficientRole => "forbidden".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature | TokenError::WrongAudience | TokenError::Malformed => {
                AuthError::InvalidToken
            }
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Signing(detail) => AuthError::Internal(detail),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::AccountNotFound,
            StoreError::Unavailable(detail) => AuthError::Internal(detail),
        }
    }
}

/// Bodies that are not JSON, lack a field or carry the wrong content type are a 400 with
/// the usual `{"message"}` shape instead of axum's plain-text rejection.
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::InvalidRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}
