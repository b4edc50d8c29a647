use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::retry::{RetryError, RetryPolicy, Retryable};
use crate::config::GoogleConfig;

/// Normalized identity extracted from a verified third-party assertion.
/// Ephemeral; only used to locate or create the matching principal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Forged, expired, wrong-audience, or otherwise untrusted assertion.
    /// Deterministic for a given input, so never retried.
    #[error("identity assertion rejected")]
    InvalidAssertion,
    /// The provider could not be reached; retried under policy.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity verification aborted")]
    Aborted,
}

impl Retryable for VerifyError {
    fn is_transient(&self) -> bool {
        matches!(self, VerifyError::Unavailable(_))
    }
}

/// Verifies a third-party identity assertion and extracts a normalized claim.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(
        &self,
        assertion: &str,
        cancel: &CancellationToken,
    ) -> Result<IdentityClaim, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google ID-token verification against the tokeninfo endpoint, checked
/// against the configured client id.
pub struct GoogleVerifier {
    http: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
    retry: RetryPolicy,
}

impl GoogleVerifier {
    pub fn new(google: &GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokeninfo_url: google.tokeninfo_url.clone(),
            client_id: google.client_id.clone(),
            retry: RetryPolicy::new(
                google.verify_retry.max_attempts,
                std::time::Duration::from_millis(google.verify_retry.base_delay_ms),
            ),
        }
    }

    async fn fetch(&self, assertion: &str) -> Result<TokenInfo, VerifyError> {
        let response = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", assertion)])
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(VerifyError::Unavailable(format!("provider returned {}", status)));
        }
        if !status.is_success() {
            // 4xx means the assertion itself was rejected.
            return Err(VerifyError::InvalidAssertion);
        }

        response
            .json::<TokenInfo>()
            .await
            .map_err(|_| VerifyError::InvalidAssertion)
    }

    fn normalize(&self, info: TokenInfo) -> Result<IdentityClaim, VerifyError> {
        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "identity assertion issued for a different audience");
            return Err(VerifyError::InvalidAssertion);
        }

        let email = info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
            .ok_or(VerifyError::InvalidAssertion)?;
        let name = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or(VerifyError::InvalidAssertion)?;

        Ok(IdentityClaim {
            email,
            name,
            picture: info.picture,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(
        &self,
        assertion: &str,
        cancel: &CancellationToken,
    ) -> Result<IdentityClaim, VerifyError> {
        let info = self
            .retry
            .run(cancel, |_| self.fetch(assertion))
            .await
            .map_err(|err| match err {
                RetryError::Aborted => VerifyError::Aborted,
                RetryError::Operation(e) => e,
            })?;
        self.normalize(info)
    }
}
