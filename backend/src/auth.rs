use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::{
    errors::AuthError,
    models::{AccountId, Role},
    token::TokenCodec,
};

/// AuthenticatedIdentity
///
/// The verified claims of the current request. Inserted into the request extensions by
/// [`require_auth`] and read by handlers through the extractor below. The role is the
/// one recorded at issuance; it is not refreshed from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub id: AccountId,
    pub username: String,
    pub role: Option<Role>,
    pub expires_at: u64,
}

impl AuthenticatedIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// Ownership rule for account resources: the account itself, or an admin.
    pub fn can_manage(&self, target: AccountId) -> bool {
        self.id == target || self.is_admin()
    }
}

/// AuthorizationGate
///
/// The one token check shared by every protected route of a service. Built once at
/// startup with the service's codec and the role its routes require, then installed
/// as a route layer.
#[derive(Clone)]
pub struct AuthorizationGate {
    codec: Arc<TokenCodec>,
    required_role: Option<Role>,
}

impl AuthorizationGate {
    /// Any validly signed, unexpired token passes.
    pub fn authenticated(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            required_role: None,
        }
    }

    /// Additionally requires `role` to be embedded in the token.
    pub fn requiring(codec: Arc<TokenCodec>, role: Role) -> Self {
        Self {
            codec,
            required_role: Some(role),
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    /// authorize
    ///
    /// Evaluates the raw `Authorization` header value.
    ///
    /// NoToken -> Parsing -> {Valid, InvalidSignature, Expired, Malformed}
    ///         -> {Authorized, Rejected}
    pub fn authorize(&self, authorization: Option<&str>) -> Result<AuthenticatedIdentity, AuthError> {
        self.authorize_at(authorization, Utc::now())
    }

    pub fn authorize_at(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let token = bearer_token(authorization).ok_or(AuthError::MissingToken)?;
        let claims = self.codec.parse_at(token, now)?;

        if let Some(required) = self.required_role {
            if claims.role != Some(required) {
                return Err(AuthError::InsufficientRole);
            }
        }

        let id = claims.account_id().ok_or(AuthError::InvalidToken)?;
        Ok(AuthenticatedIdentity {
            id,
            username: claims.username,
            role: claims.role,
            expires_at: claims.exp,
        })
    }
}

/// Extracts the credential from `Bearer <token>`. Other schemes and empty values
/// count as no token at all.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// require_auth
///
/// Route-layer middleware running the gate before any handler. On success the
/// identity is attached to the request; on failure the `AuthError` becomes the
/// response (401 or 403) and the handler never runs.
pub async fn require_auth(
    State(gate): State<AuthorizationGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match gate.authorize(authorization) {
        Ok(identity) => {
            tracing::debug!(account_id = identity.id, "request authorized");
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(reason) => {
            tracing::debug!(%reason, required_role = ?gate.required_role, "request rejected");
            Err(reason)
        }
    }
}

/// AuthenticatedIdentity Extractor
///
/// Reads the identity placed by [`require_auth`]. On a route without the gate there is
/// nothing to read and the request is treated as unauthenticated.
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
