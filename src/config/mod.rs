use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Development fallback secret; refused in production by `validate()`.
const DEV_JWT_SECRET: &str = "S3cr3t@K3y-D3v-2024*";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub signing_retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub tokeninfo_url: String,
    pub verify_retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT secret must be configured")]
    MissingJwtSecret,
    #[error("refusing to run with the development JWT secret in production")]
    DefaultSecretInProduction,
    #[error("token signing requires at least one attempt")]
    ZeroSigningAttempts,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment-profile defaults, then specific env var overrides.
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Checks invariants that should stop the process at startup rather
    /// than surface as per-request failures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.environment == Environment::Production && self.security.jwt_secret == DEV_JWT_SECRET
        {
            return Err(ConfigError::DefaultSecretInProduction);
        }
        if self.security.signing_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroSigningAttempts);
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SECRET_JWT_SEED") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("TOKEN_TTL_SECS") {
            self.security.token_ttl_secs = v.parse().unwrap_or(self.security.token_ttl_secs);
        }
        if let Ok(v) = env::var("SIGNING_MAX_ATTEMPTS") {
            self.security.signing_retry.max_attempts =
                v.parse().unwrap_or(self.security.signing_retry.max_attempts);
        }
        if let Ok(v) = env::var("SIGNING_BASE_DELAY_MS") {
            self.security.signing_retry.base_delay_ms =
                v.parse().unwrap_or(self.security.signing_retry.base_delay_ms);
        }
        if let Ok(v) = env::var("GOOGLE_ID") {
            self.google.client_id = v;
        }
        if let Ok(v) = env::var("GOOGLE_TOKENINFO_URL") {
            self.google.tokeninfo_url = v;
        }
        if let Ok(v) = env::var("GOOGLE_VERIFY_MAX_ATTEMPTS") {
            self.google.verify_retry.max_attempts =
                v.parse().unwrap_or(self.google.verify_retry.max_attempts);
        }
        if let Ok(v) = env::var("GOOGLE_VERIFY_BASE_DELAY_MS") {
            self.google.verify_retry.base_delay_ms =
                v.parse().unwrap_or(self.google.verify_retry.base_delay_ms);
        }
        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                enable_cors: true,
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                token_ttl_secs: 4 * 60 * 60, // 4h
                signing_retry: RetryConfig {
                    max_attempts: 3,
                    base_delay_ms: 200,
                },
            },
            google: GoogleConfig {
                client_id: String::new(),
                tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
                verify_retry: RetryConfig {
                    max_attempts: 3,
                    base_delay_ms: 500,
                },
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                enable_cors: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from SECRET_JWT_SEED
                token_ttl_secs: 4 * 60 * 60,
                signing_retry: RetryConfig {
                    max_attempts: 3,
                    base_delay_ms: 200,
                },
            },
            google: GoogleConfig {
                client_id: String::new(),
                tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
                verify_retry: RetryConfig {
                    max_attempts: 3,
                    base_delay_ms: 500,
                },
            },
        }
    }
}
