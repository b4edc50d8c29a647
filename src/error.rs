// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::token::TokenError;
use crate::auth::VerifyError;
use crate::middleware::gate::GateError;
use crate::middleware::resolve::ResolveError;
use crate::store::StoreError;
use crate::validation::ValidationReport;

/// HTTP API error with status classification, machine-readable code, and a
/// client-safe message. Every error leaving the pipeline goes through this.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request: the full per-field failure list, one round trip
    Validation(ValidationReport),

    // 401 Unauthorized
    Unauthenticated { code: &'static str, message: String },

    // 403 Forbidden
    Forbidden { code: &'static str, message: String },

    // 404 Not Found
    NotFound(String),

    // 500: pipeline invoked out of order or other server defect
    Misconfigured { code: &'static str, message: String },

    // 500
    Internal(String),

    // 502: external verifier unreachable after exhausting retries
    UpstreamUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Misconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthenticated { code, .. } => code,
            ApiError::Forbidden { code, .. } => code,
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Misconfigured { code, .. } => code,
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(_) => "Validation failed",
            ApiError::Unauthenticated { message, .. } => message,
            ApiError::Forbidden { message, .. } => message,
            ApiError::NotFound(message) => message,
            ApiError::Misconfigured { message, .. } => message,
            ApiError::Internal(message) => message,
            ApiError::UpstreamUnavailable(message) => message,
        }
    }

    /// `{status, code, message | errors, timestamp}` envelope.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "status": "error",
            "code": self.code(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        match self {
            ApiError::Validation(report) => {
                body["errors"] = json!(report);
            }
            _ => {
                body["message"] = json!(self.message());
            }
        }
        body
    }

    pub fn unauthenticated(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Unauthenticated {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn misconfigured(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Misconfigured {
            code,
            message: message.into(),
        }
    }
}

impl From<ValidationReport> for ApiError {
    fn from(report: ValidationReport) -> Self {
        ApiError::Validation(report)
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingCredential => {
                ApiError::unauthenticated("TOKEN_MISSING", "Authentication token not provided")
            }
            ResolveError::InvalidCredential => {
                ApiError::unauthenticated("TOKEN_INVALID", "Invalid authentication token")
            }
            // Same outward message for both so callers cannot probe which
            // accounts exist.
            ResolveError::PrincipalNotFound => {
                ApiError::unauthenticated("USER_NOT_FOUND", "User not found or inactive")
            }
            ResolveError::PrincipalInactive => {
                ApiError::unauthenticated("USER_INACTIVE", "User not found or inactive")
            }
            ResolveError::Store(err) => err.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::NoPrincipalResolved => ApiError::misconfigured(
                "TOKEN_VALIDATION_REQUIRED",
                "Token validation must run before role checks",
            ),
            GateError::EmptyRequirement => ApiError::misconfigured(
                "EMPTY_ROLE_REQUIREMENT",
                "Route is configured with no acceptable roles",
            ),
            GateError::InsufficientRole { name, required } => ApiError::forbidden(
                "INSUFFICIENT_PERMISSIONS",
                format!("{} does not have one of the required roles: {}", name, required),
            ),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Malformed => {
                ApiError::unauthenticated("TOKEN_INVALID", "Invalid authentication token")
            }
            TokenError::Signing(signing) => {
                tracing::error!(error = %signing, "token issuance failed");
                if matches!(signing, crate::auth::SigningError::Unavailable(_)) {
                    ApiError::UpstreamUnavailable("Token service temporarily unavailable".into())
                } else {
                    ApiError::Internal("Could not generate authentication token".into())
                }
            }
            TokenError::Aborted => ApiError::Internal("Request aborted".into()),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidAssertion => {
                ApiError::unauthenticated("GOOGLE_TOKEN_INVALID", "Google token could not be verified")
            }
            VerifyError::Unavailable(reason) => {
                tracing::error!(%reason, "identity provider unreachable after retries");
                ApiError::UpstreamUnavailable("Identity provider temporarily unavailable".into())
            }
            VerifyError::Aborted => ApiError::Internal("Request aborted".into()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Log the real error but return a generic message.
        tracing::error!(error = %err, "store error while handling request");
        ApiError::Internal("An error occurred while processing your request".into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{body as body_field, ValidationFailure};

    #[test]
    fn validation_errors_carry_the_full_failure_list() {
        let report = ValidationReport::from(vec![
            ValidationFailure::new(&body_field("name"), "is required"),
            ValidationFailure::new(&body_field("email"), "must be a valid email"),
        ]);
        let err = ApiError::from(report);

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let json = err.to_json();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["errors"].as_array().unwrap().len(), 2);
        assert_eq!(json["errors"][0]["field"], "name");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn expired_and_malformed_tokens_are_indistinguishable() {
        let expired = ApiError::from(TokenError::Expired);
        let malformed = ApiError::from(TokenError::Malformed);
        assert_eq!(expired.code(), malformed.code());
        assert_eq!(expired.message(), malformed.message());
    }

    #[test]
    fn not_found_and_inactive_share_an_outward_message() {
        let not_found = ApiError::from(ResolveError::PrincipalNotFound);
        let inactive = ApiError::from(ResolveError::PrincipalInactive);
        assert_eq!(not_found.message(), inactive.message());
        assert_eq!(not_found.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(inactive.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unreachable_provider_is_never_a_credential_error() {
        let err = ApiError::from(VerifyError::Unavailable("timeout".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
