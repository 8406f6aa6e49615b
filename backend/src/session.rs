use std::sync::Arc;

use crate::{
    errors::AuthError,
    models::{Account, AccountView, NewAccount, RegisterRequest, Role, require_fields},
    password::{self, PasswordHasher},
    repository::StoreState,
    token::{Claims, Grant, TokenCodec},
};

/// Session
///
/// Outcome of a successful login or registration.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: Claims,
    pub account: AccountView,
}

/// SessionIssuer
///
/// Turns a username and password into a signed session. Lookup misses and password
/// mismatches are reported as the same `InvalidCredentials` error after the same amount
/// of hashing work, so responses do not reveal which usernames exist.
pub struct SessionIssuer {
    store: StoreState,
    hasher: Arc<PasswordHasher>,
    codec: Arc<TokenCodec>,
    // Admin-service tokens carry the role; user-service tokens do not.
    embed_role: bool,
}

impl SessionIssuer {
    pub fn new(
        store: StoreState,
        hasher: Arc<PasswordHasher>,
        codec: Arc<TokenCodec>,
        embed_role: bool,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            embed_role,
        }
    }

    /// login
    ///
    /// 1. Look the account up by username.
    /// 2. Verify the password on the blocking pool (against the dummy digest on a miss).
    /// 3. Issue a token for the account.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let account = self.store.find_by_username(username).await?;
        let digest = account.as_ref().map(|a| a.password_hash.clone());

        let matched =
            password::verify_blocking(self.hasher.clone(), password.to_string(), digest).await?;

        match account {
            Some(account) if matched => {
                tracing::info!(account_id = account.id, "login succeeded");
                self.issue_for(&account)
            }
            _ => {
                tracing::info!("login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// register
    ///
    /// Creates a `Role::User` account and signs it in. Duplicate usernames and emails are
    /// reported specifically. The early lookups avoid hashing for obvious clashes; the
    /// store's atomic insert settles races between concurrent registrations.
    pub async fn register(&self, request: RegisterRequest) -> Result<Session, AuthError> {
        require_fields(&[
            ("username", request.username.as_str()),
            ("email", request.email.as_str()),
            ("password", request.password.as_str()),
        ])?;

        if self.store.find_by_username(&request.username).await?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = password::hash_blocking(self.hasher.clone(), request.password).await?;
        let account = self
            .store
            .insert(NewAccount {
                username: request.username,
                email: request.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(account_id = account.id, "account registered");
        self.issue_for(&account)
    }

    /// Signs a session for an account that has already been authenticated.
    pub fn issue_for(&self, account: &Account) -> Result<Session, AuthError> {
        let issued = self.codec.issue(Grant {
            subject: account.id,
            username: account.username.clone(),
            role: self.embed_role.then_some(account.role),
        })?;

        Ok(Session {
            token: issued.token,
            claims: issued.claims,
            account: AccountView::from(account),
        })
    }

    pub fn token_ttl_secs(&self) -> u64 {
        self.codec.ttl().as_secs()
    }
}
