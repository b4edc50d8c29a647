use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validation::{chains, CheckContext};

use super::login::SessionResponse;

/// POST /auth/google - exchange a third-party identity assertion for a local
/// credential. The verifier call crosses the network and retries transient
/// provider failures; a rejected assertion fails immediately.
pub async fn google_sign_in(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<SessionResponse> {
    let ctx = CheckContext::body_only(&body, &state.store);
    let report = chains::federated_login().run(&ctx).await;
    if !report.is_empty() {
        return Err(report.into());
    }

    let assertion = body["id_token"].as_str().unwrap_or_default();
    let claim = state.verifier.verify(assertion, &state.shutdown).await?;

    let principal = state.directory.ensure_principal(&claim).await?;
    if !principal.active {
        tracing::warn!(user = %principal.email, "federated sign-in rejected: account blocked");
        return Err(ApiError::unauthenticated(
            "USER_BLOCKED",
            "User is blocked, contact the administrator",
        ));
    }

    let token = state.tokens.issue(principal.id, &state.shutdown).await?;
    tracing::info!(user = %principal.email, "federated sign-in succeeded");

    Ok(ApiResponse::success(SessionResponse {
        user: principal,
        token,
    }))
}
