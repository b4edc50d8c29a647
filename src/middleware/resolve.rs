use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use crate::auth::TokenService;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{DocumentStore, Principal, StoreError};

/// Conventional header carrying the bearer credential.
pub const TOKEN_HEADER: &str = "x-token";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("authentication token not provided")]
    MissingCredential,
    /// Expired and malformed credentials collapse here; which one it was is
    /// never leaked to the caller.
    #[error("invalid authentication token")]
    InvalidCredential,
    #[error("user not found or inactive")]
    PrincipalNotFound,
    #[error("user not found or inactive")]
    PrincipalInactive,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a raw credential header into an authenticated [`Principal`], or a
/// typed failure. One store read per resolution, no caching, so out-of-band
/// deactivation takes effect on the next request.
pub struct PrincipalResolver {
    tokens: Arc<TokenService>,
    store: Arc<dyn DocumentStore>,
}

impl PrincipalResolver {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn DocumentStore>) -> Self {
        Self { tokens, store }
    }

    pub async fn resolve(&self, header: Option<&str>) -> Result<Principal, ResolveError> {
        let token = header
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ResolveError::MissingCredential)?;

        let subject = self.tokens.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "credential verification failed");
            ResolveError::InvalidCredential
        })?;

        let principal = self
            .store
            .find_principal_by_id(subject)
            .await?
            .ok_or(ResolveError::PrincipalNotFound)?;

        if !principal.active {
            tracing::warn!(user = %principal.email, "inactive principal presented a valid credential");
            return Err(ResolveError::PrincipalInactive);
        }

        Ok(principal)
    }
}

/// Middleware that resolves the `x-token` credential and injects the
/// authenticated [`Principal`] into the request for downstream gates and
/// handlers.
pub async fn principal_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let principal = state.resolver.resolve(header.as_deref()).await?;
    tracing::debug!(user = %principal.email, role = %principal.role, "principal resolved");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
