use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Account, AccountChanges, AccountId, NewAccount};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("account not found")]
    NotFound,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// CredentialStore
///
/// The contract the session issuer and the account handlers rely on. Implementations
/// must make `insert` and `update` atomic with respect to the username and email
/// uniqueness checks: two concurrent writers claiming the same username cannot both
/// succeed.
///
/// **Send + Sync + async_trait** keep `Arc<dyn CredentialStore>` usable across Axum's
/// task boundaries.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // --- Lookups ---
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;
    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    // --- Writes ---
    /// Assigns the next id and stores the account, or reports which unique field clashed.
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;
    /// Applies `changes` to account `id`. Uniqueness is checked against other accounts only.
    async fn update(&self, id: AccountId, changes: AccountChanges) -> Result<Account, StoreError>;
    /// Returns false when no such account existed.
    async fn delete(&self, id: AccountId) -> Result<bool, StoreError>;
}

/// StoreState
///
/// The shared handle placed in the application state.
pub type StoreState = Arc<dyn CredentialStore>;

#[derive(Default)]
struct Accounts {
    rows: Vec<Account>,
    last_id: AccountId,
}

impl Accounts {
    fn check_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<AccountId>,
    ) -> Result<(), StoreError> {
        let others = self.rows.iter().filter(|a| Some(a.id) != except);
        for account in others {
            if username.is_some_and(|u| account.username == u) {
                return Err(StoreError::DuplicateUsername);
            }
            if email.is_some_and(|e| account.email == e) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        Ok(())
    }
}

/// InMemoryCredentialStore
///
/// Reference store backing both services. Every write takes the write half of one
/// `RwLock`, so check-then-insert happens inside a single critical section.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<Accounts>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.rows.iter().find(|a| a.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.rows.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.rows.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.read().await.rows.clone())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        accounts.check_unique(Some(&account.username), Some(&account.email), None)?;

        accounts.last_id += 1;
        let created = Account {
            id: accounts.last_id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            created_at: Utc::now(),
        };
        accounts.rows.push(created.clone());

        tracing::debug!(account_id = created.id, "account created");
        Ok(created)
    }

    async fn update(&self, id: AccountId, changes: AccountChanges) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if !accounts.rows.iter().any(|a| a.id == id) {
            return Err(StoreError::NotFound);
        }
        accounts.check_unique(changes.username.as_deref(), changes.email.as_deref(), Some(id))?;

        let account = accounts
            .rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(username) = changes.username {
            account.username = username;
        }
        if let Some(email) = changes.email {
            account.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            account.password_hash = password_hash;
        }
        if let Some(role) = changes.role {
            account.role = role;
        }

        Ok(account.clone())
    }

    async fn delete(&self, id: AccountId) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.rows.len();
        accounts.rows.retain(|a| a.id != id);
        Ok(accounts.rows.len() != before)
    }
}
