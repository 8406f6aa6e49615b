use std::{env, fmt};

use thiserror::Error;

use crate::password::HashCost;

/// Development-only signing secret. Never accepted when `APP_ENV=production`.
pub const LOCAL_JWT_SECRET: &str = "portal-local-development-secret";

/// Password given to the seeded demo account when running locally.
pub const LOCAL_SEED_PASSWORD: &str = "password1";

/// AppConfig
///
/// Holds the configuration of one running service. Immutable once loaded and pulled
/// into handlers and extractors through `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // Which of the two backends this process serves.
    pub service: ServiceKind,
    // Runtime environment marker. Controls the secret fallback and the log format.
    pub env: Env,
    // TCP port the HTTP server binds on 0.0.0.0.
    pub port: u16,
    // Secret used to sign and verify session tokens. Read once at startup.
    pub jwt_secret: String,
    // Argon2 cost parameters for new password digests.
    pub hash_cost: HashCost,
    // Password of the seeded demo account. `None` disables seeding.
    pub seed_password: Option<String>,
}

/// Env
///
/// Runtime context. `Local` allows development fallbacks, `Production` refuses them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ServiceKind
///
/// The two backends built from this crate. The admin service embeds the role in its
/// tokens and gates every protected route on `Role::Admin`; the user service only
/// requires a valid session and additionally exposes self-registration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ServiceKind {
    Admin,
    User,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Admin => "admin-backend",
            ServiceKind::User => "user-backend",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            ServiceKind::Admin => 3001,
            ServiceKind::User => 4000,
        }
    }
}

// Secrets never reach logs or panic messages.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("service", &self.service)
            .field("env", &self.env)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("hash_cost", &self.hash_cost)
            .field("seed_password", &self.seed_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value in production")]
    MissingSecret,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl Default for AppConfig {
    /// default
    ///
    /// Local user-service configuration with known values, used to scaffold test state
    /// without touching the process environment.
    fn default() -> Self {
        Self {
            service: ServiceKind::User,
            env: Env::Local,
            port: ServiceKind::User.default_port(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            hash_cost: HashCost::default(),
            seed_password: Some(LOCAL_SEED_PASSWORD.to_string()),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration for `service` from the process environment.
    ///
    /// # Errors
    /// Fails in production when `JWT_SECRET` is absent or empty, and in any environment
    /// when a numeric variable does not parse. The caller is expected to abort startup.
    pub fn load(service: ServiceKind) -> Result<Self, ConfigError> {
        Self::from_lookup(service, |key| env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] but with an arbitrary variable source.
    pub fn from_lookup<F>(service: ServiceKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (env, lookup("JWT_SECRET")) {
            (_, Some(secret)) if !secret.trim().is_empty() => secret,
            (Env::Production, _) => return Err(ConfigError::MissingSecret),
            (Env::Local, _) => LOCAL_JWT_SECRET.to_string(),
        };

        let port = parse_or(&lookup, "PORT", service.default_port())?;

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        // Production never seeds the well-known demo password.
        let seed_password = match env {
            Env::Production => lookup("SEED_PASSWORD"),
            Env::Local => {
                Some(lookup("SEED_PASSWORD").unwrap_or_else(|| LOCAL_SEED_PASSWORD.to_string()))
            }
        };

        Ok(Self {
            service,
            env,
            port,
            jwt_secret,
            hash_cost,
            seed_password,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
