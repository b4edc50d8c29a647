use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::retry::{RetryError, RetryPolicy, Retryable};
use crate::config::SecurityConfig;

/// Signed token payload. Immutable once issued; `jti` makes every issued
/// token distinct even for back-to-back issuance within one second.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(subject: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    /// The signing backend could not be reached; retrying may help.
    #[error("signing backend unavailable: {0}")]
    Unavailable(String),
    /// The backend rejected the request; retrying will not help.
    #[error("could not sign token: {0}")]
    Rejected(String),
}

impl Retryable for SigningError {
    fn is_transient(&self) -> bool {
        matches!(self, SigningError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or signature invalid")]
    Malformed,
    #[error("token issuance aborted")]
    Aborted,
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Seam over the signing backend so issuance can retry transient outages
/// and tests can inject failures.
pub trait Signer: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, SigningError>;
}

/// Local HS256 signer over the shared secret.
pub struct HmacSigner {
    key: EncodingKey,
}

impl HmacSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
        encode(&Header::default(), claims, &self.key)
            .map_err(|e| SigningError::Rejected(e.to_string()))
    }
}

/// Issues and verifies the bearer credential clients present in `x-token`.
pub struct TokenService {
    signer: Arc<dyn Signer>,
    decoding_key: DecodingKey,
    ttl: Duration,
    retry: RetryPolicy,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Self {
        Self::with_signer(
            Arc::new(HmacSigner::new(&security.jwt_secret)),
            &security.jwt_secret,
            security.token_ttl_secs,
            RetryPolicy::new(
                security.signing_retry.max_attempts,
                std::time::Duration::from_millis(security.signing_retry.base_delay_ms),
            ),
        )
    }

    pub fn with_signer(
        signer: Arc<dyn Signer>,
        secret: &str,
        ttl_secs: i64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            signer,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
            retry,
        }
    }

    /// Issues a fresh credential for `subject`. Transient signer failures
    /// retry under the configured policy; exhaustion surfaces the last
    /// signing error.
    pub async fn issue(
        &self,
        subject: Uuid,
        cancel: &CancellationToken,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(subject, self.ttl);
        self.retry
            .run(cancel, |_| std::future::ready(self.signer.sign(&claims)))
            .await
            .map_err(|err| match err {
                RetryError::Aborted => TokenError::Aborted,
                RetryError::Operation(e) => TokenError::Signing(e),
            })
    }

    /// Checks signature and expiry; never retries and never touches the
    /// store. A token presented at exactly its expiry instant is expired.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below so the boundary is exclusive on the valid
        // side; the library check is inclusive.
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Malformed)?;

        if Utc::now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service() -> TokenService {
        service_with_ttl(3600)
    }

    fn service_with_ttl(ttl_secs: i64) -> TokenService {
        TokenService::with_signer(
            Arc::new(HmacSigner::new("test-secret")),
            "test-secret",
            ttl_secs,
            RetryPolicy::new(3, std::time::Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn verify_returns_the_issued_subject_before_expiry() {
        let service = service();
        let subject = Uuid::new_v4();
        let token = service.issue(subject, &CancellationToken::new()).await.unwrap();
        assert_eq!(service.verify(&token).unwrap(), subject);
    }

    #[tokio::test]
    async fn token_is_expired_at_exactly_the_expiry_instant() {
        // Zero ttl makes exp == iat == now, which must already read as expired.
        let service = service_with_ttl(0);
        let token = service
            .issue(Uuid::new_v4(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn issuing_twice_yields_distinct_tokens_for_the_same_subject() {
        let service = service();
        let subject = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let first = service.issue(subject, &cancel).await.unwrap();
        let second = service.issue(subject, &cancel).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(service.verify(&first).unwrap(), subject);
        assert_eq!(service.verify(&second).unwrap(), subject);
    }

    #[test]
    fn garbage_and_wrong_secret_tokens_are_malformed() {
        let service = service();
        assert!(matches!(service.verify("not-a-token"), Err(TokenError::Malformed)));

        let other = TokenService::with_signer(
            Arc::new(HmacSigner::new("other-secret")),
            "other-secret",
            3600,
            RetryPolicy::new(1, std::time::Duration::from_millis(1)),
        );
        let foreign = futures::executor::block_on(
            other.issue(Uuid::new_v4(), &CancellationToken::new()),
        )
        .unwrap();
        assert!(matches!(service.verify(&foreign), Err(TokenError::Malformed)));
    }

    struct FlakySigner {
        inner: HmacSigner,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl Signer for FlakySigner {
        fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                Err(SigningError::Unavailable("signer outage".into()))
            } else {
                self.inner.sign(claims)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn issuance_retries_transient_signing_failures() {
        let signer = Arc::new(FlakySigner {
            inner: HmacSigner::new("test-secret"),
            fail_first: 2,
            calls: AtomicU32::new(0),
        });
        let service = TokenService::with_signer(
            signer.clone(),
            "test-secret",
            3600,
            RetryPolicy::new(3, std::time::Duration::from_millis(50)),
        );

        let subject = Uuid::new_v4();
        let token = service.issue(subject, &CancellationToken::new()).await.unwrap();
        assert_eq!(signer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.verify(&token).unwrap(), subject);
    }

    #[tokio::test(start_paused = true)]
    async fn issuance_surfaces_the_terminal_error_after_exhaustion() {
        let signer = Arc::new(FlakySigner {
            inner: HmacSigner::new("test-secret"),
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let service = TokenService::with_signer(
            signer.clone(),
            "test-secret",
            3600,
            RetryPolicy::new(3, std::time::Duration::from_millis(50)),
        );

        let result = service.issue(Uuid::new_v4(), &CancellationToken::new()).await;
        assert_eq!(signer.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(TokenError::Signing(SigningError::Unavailable(_)))
        ));
    }
}
