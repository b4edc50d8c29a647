use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::store::Principal;
use crate::validation::{chains, CheckContext};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Principal,
    pub token: String,
}

/// One generic rejection for every login failure mode, so a caller cannot
/// learn whether the email, the account state, or the password was wrong.
fn bad_login() -> ApiError {
    ApiError::unauthenticated("LOGIN_FAILED", "Invalid credentials")
}

/// POST /auth/login - authenticate with email/password and receive a fresh
/// credential. Login never inspects an existing token; it always issues.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<SessionResponse> {
    let ctx = CheckContext::body_only(&body, &state.store);
    let report = chains::login().run(&ctx).await;
    if !report.is_empty() {
        return Err(report.into());
    }

    let email = body["email"].as_str().unwrap_or_default().to_lowercase();
    let password = body["password"].as_str().unwrap_or_default();

    let principal = match state.store.find_principal_by_email(&email).await? {
        Some(p) if p.active => p,
        _ => {
            tracing::debug!(%email, "login rejected: unknown or inactive account");
            return Err(bad_login());
        }
    };

    // Federated-only accounts have no local password.
    let Some(hash) = principal.password_hash.as_deref() else {
        tracing::debug!(%email, "login rejected: no local password on account");
        return Err(bad_login());
    };
    if !bcrypt::verify(password, hash).unwrap_or(false) {
        tracing::debug!(%email, "login rejected: password mismatch");
        return Err(bad_login());
    }

    let token = state.tokens.issue(principal.id, &state.shutdown).await?;
    tracing::info!(user = %principal.email, "login succeeded");

    Ok(ApiResponse::success(SessionResponse {
        user: principal,
        token,
    }))
}
