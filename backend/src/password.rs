use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use password_hash::{PasswordHash, SaltString};

use crate::errors::AuthError;

/// HashCost
///
/// Argon2id cost parameters applied to newly created digests. Verification always uses
/// the parameters recorded inside the digest itself, so raising the cost never breaks
/// existing accounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    /// Smallest cost Argon2 accepts. Only meant for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// PasswordHasher
///
/// Salted Argon2id hashing and verification. Digests are PHC strings, so the salt and
/// cost travel with the hash and no separate storage is needed.
///
/// The hasher also keeps a digest of a throwaway password computed at construction.
/// Logins for unknown usernames verify against it so both failure paths do the same
/// amount of work.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_digest: String,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Internal(format!("invalid argon2 parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_digest: String::new(),
        };
        hasher.dummy_digest = hasher.hash("portal-dummy-credential")?;
        Ok(hasher)
    }

    /// hash
    ///
    /// Produces a PHC digest of `plaintext` under a fresh 16-byte random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes)
            .map_err(|e| AuthError::Internal(format!("salt generation failed: {e}")))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::Internal(format!("salt encoding failed: {e}")))?;

        let digest = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;
        Ok(digest.to_string())
    }

    /// verify
    ///
    /// Re-derives the candidate digest with the salt and cost stored in `digest` and
    /// compares in constant time. A digest that does not parse is a mismatch.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burns one verification against the dummy digest. Always `false`.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_digest);
        false
    }
}

// Argon2 holds a worker for tens of milliseconds per call, so the async paths
// run it on the blocking pool instead of the runtime threads.

/// Runs `task` on the blocking pool. A task that panics or is cancelled is an internal
/// failure, never a password mismatch.
pub async fn run_blocking<F, T>(task: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AuthError::Internal(format!("password task failed: {e}")))
}

pub async fn hash_blocking(hasher: Arc<PasswordHasher>, plaintext: String) -> Result<String, AuthError> {
    run_blocking(move || hasher.hash(&plaintext)).await?
}

/// Verifies `plaintext` against `digest`, or against the dummy digest when there is no
/// account to check. A malformed digest is `Ok(false)`.
pub async fn verify_blocking(
    hasher: Arc<PasswordHasher>,
    plaintext: String,
    digest: Option<String>,
) -> Result<bool, AuthError> {
    run_blocking(move || match digest {
        Some(digest) => hasher.verify(&plaintext, &digest),
        None => hasher.verify_dummy(&plaintext),
    })
    .await
}
