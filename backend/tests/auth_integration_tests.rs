use axum::{
    Json, Router,
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
    middleware,
    response::IntoResponse,
    routing::get,
};
use chrono::{Duration as ChronoDuration, Utc};
use portal_backend::{
    AuthError, AuthenticatedIdentity, AuthorizationGate,
    auth::{self, bearer_token},
    errors::UNAUTHENTICATED_MESSAGE,
    models::Role,
    token::{Grant, SESSION_TTL, TokenCodec},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(TEST_JWT_SECRET, SESSION_TTL))
}

fn token_for(codec: &TokenCodec, id: i64, role: Option<Role>) -> String {
    codec
        .issue(Grant {
            subject: id,
            username: format!("account{id}"),
            role,
        })
        .unwrap()
        .token
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

/// A protected router of one route that echoes the identity the gate attached.
fn gated_router(gate: AuthorizationGate) -> Router {
    async fn whoami(identity: AuthenticatedIdentity) -> Json<Value> {
        Json(serde_json::json!({ "id": identity.id, "username": identity.username }))
    }

    Router::new()
        .route("/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(gate, auth::require_auth))
}

async fn send(router: Router, authorization: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri("/whoami");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let response = router.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// --- Gate Decisions ---

#[test]
fn test_gate_accepts_valid_token() {
    let codec = codec();
    let gate = AuthorizationGate::authenticated(codec.clone());

    let identity = gate
        .authorize(Some(&bearer(&token_for(&codec, 5, None))))
        .unwrap();

    assert_eq!(identity.id, 5);
    assert_eq!(identity.username, "account5");
    assert_eq!(identity.role, None);
    assert!(!identity.is_admin());
}

#[test]
fn test_gate_missing_header_is_unauthenticated() {
    let gate = AuthorizationGate::authenticated(codec());

    for header in [None, Some(""), Some("Bearer"), Some("Bearer   "), Some("Basic dXNlcjpwYXNz")] {
        let err = gate.authorize(header).unwrap_err();
        assert_eq!(err, AuthError::MissingToken, "header {header:?}");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}

#[test]
fn test_gate_rejects_token_from_another_secret() {
    let gate = AuthorizationGate::authenticated(codec());
    let foreign = TokenCodec::new("some-other-secret", SESSION_TTL);

    let err = gate
        .authorize(Some(&bearer(&token_for(&foreign, 1, Some(Role::Admin)))))
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidToken);
}

#[test]
fn test_gate_rejects_garbage() {
    let gate = AuthorizationGate::authenticated(codec());
    let err = gate.authorize(Some("Bearer not.a.jwt")).unwrap_err();
    assert_eq!(err, AuthError::InvalidToken);
}

#[test]
fn test_gate_rejects_expired_token() {
    let codec = codec();
    let gate = AuthorizationGate::authenticated(codec.clone());
    let issued = codec
        .issue_at(
            Grant {
                subject: 1,
                username: "admin".to_string(),
                role: Some(Role::Admin),
            },
            Utc::now() - ChronoDuration::hours(2),
        )
        .unwrap();

    let err = gate.authorize(Some(&bearer(&issued.token))).unwrap_err();
    assert_eq!(err, AuthError::TokenExpired);
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_gate_expiry_uses_supplied_clock() {
    let codec = codec();
    let gate = AuthorizationGate::authenticated(codec.clone());
    let issued = codec
        .issue(Grant {
            subject: 3,
            username: "user1".to_string(),
            role: None,
        })
        .unwrap();
    let header = bearer(&issued.token);
    let issued_at = chrono::DateTime::from_timestamp(issued.claims.iat as i64, 0).unwrap();

    let at_expiry = issued_at + ChronoDuration::seconds(3600);
    let after_expiry = issued_at + ChronoDuration::seconds(3601);

    assert!(gate.authorize_at(Some(&header), at_expiry).is_ok());
    assert_eq!(
        gate.authorize_at(Some(&header), after_expiry),
        Err(AuthError::TokenExpired)
    );
}

#[test]
fn test_admin_gate_requires_admin_role() {
    let codec = codec();
    let gate = AuthorizationGate::requiring(codec.clone(), Role::Admin);
    assert_eq!(gate.required_role(), Some(Role::Admin));

    let user = gate.authorize(Some(&bearer(&token_for(&codec, 2, Some(Role::User)))));
    let roleless = gate.authorize(Some(&bearer(&token_for(&codec, 2, None))));
    let admin = gate.authorize(Some(&bearer(&token_for(&codec, 1, Some(Role::Admin)))));

    assert_eq!(user.unwrap_err(), AuthError::InsufficientRole);
    assert_eq!(roleless.unwrap_err(), AuthError::InsufficientRole);
    assert_eq!(AuthError::InsufficientRole.status(), StatusCode::FORBIDDEN);
    assert!(admin.unwrap().is_admin());
}

#[test]
fn test_bearer_token_parsing() {
    assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    assert_eq!(bearer_token(Some("bearer abc")), Some("abc"));
    assert_eq!(bearer_token(Some("  BEARER   abc  ")), Some("abc"));
    assert_eq!(bearer_token(Some("Token abc")), None);
    assert_eq!(bearer_token(Some("abc")), None);
    assert_eq!(bearer_token(None), None);
}

#[test]
fn test_ownership_rule() {
    let owner = AuthenticatedIdentity {
        id: 7,
        username: "user7".to_string(),
        role: None,
        expires_at: 0,
    };
    let admin = AuthenticatedIdentity {
        id: 1,
        username: "admin".to_string(),
        role: Some(Role::Admin),
        expires_at: 0,
    };

    assert!(owner.can_manage(7));
    assert!(!owner.can_manage(8));
    assert!(admin.can_manage(8));
}

// --- Error Responses ---

#[tokio::test]
async fn test_every_401_has_the_same_body() {
    let mut bodies = Vec::new();
    for err in [
        AuthError::InvalidCredentials,
        AuthError::MissingToken,
        AuthError::InvalidToken,
        AuthError::TokenExpired,
    ] {
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        bodies.push(bytes);
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    let json: Value = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(json["message"], UNAUTHENTICATED_MESSAGE);
}

#[tokio::test]
async fn test_internal_error_detail_is_not_returned() {
    let response = AuthError::Internal("lock poisoned at repository.rs".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("repository.rs"));
}

// --- Extractor ---

#[tokio::test]
async fn test_extractor_without_gate_is_unauthenticated() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // A header alone is not enough: only the gate attaches an identity.
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Bearer whatever"),
    );

    let identity = AuthenticatedIdentity::from_request_parts(&mut parts, &()).await;
    assert_eq!(identity.unwrap_err(), AuthError::MissingToken);
}

#[tokio::test]
async fn test_extractor_reads_identity_placed_by_gate() {
    let expected = AuthenticatedIdentity {
        id: 42,
        username: "user42".to_string(),
        role: None,
        expires_at: 1,
    };
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.extensions.insert(expected.clone());

    let identity = AuthenticatedIdentity::from_request_parts(&mut parts, &()).await;
    assert_eq!(identity.unwrap(), expected);
}

// --- Middleware ---

#[tokio::test]
async fn test_middleware_passes_identity_to_handler() {
    let codec = codec();
    let router = gated_router(AuthorizationGate::authenticated(codec.clone()));

    let (status, body) = send(router, Some(bearer(&token_for(&codec, 9, None)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 9);
    assert_eq!(body["username"], "account9");
}

#[tokio::test]
async fn test_middleware_short_circuits_before_handler() {
    let codec = codec();

    let (missing, body) = send(gated_router(AuthorizationGate::authenticated(codec.clone())), None).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], UNAUTHENTICATED_MESSAGE);

    let (forbidden, body) = send(
        gated_router(AuthorizationGate::requiring(codec.clone(), Role::Admin)),
        Some(bearer(&token_for(&codec, 2, Some(Role::User)))),
    )
    .await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden");
}

#[test]
fn test_gate_rejects_token_issued_for_another_service() {
    let admin = Arc::new(TokenCodec::new(TEST_JWT_SECRET, SESSION_TTL).with_audience("admin-backend"));
    let user = Arc::new(TokenCodec::new(TEST_JWT_SECRET, SESSION_TTL).with_audience("user-backend"));
    let user_gate = AuthorizationGate::authenticated(user.clone());

    let admin_token = token_for(&admin, 1, Some(Role::Admin));
    let err = user_gate.authorize(Some(&bearer(&admin_token))).unwrap_err();

    assert_eq!(err, AuthError::InvalidToken);
    assert!(user_gate.authorize(Some(&bearer(&token_for(&user, 1, None)))).is_ok());
}
