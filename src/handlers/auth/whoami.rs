use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult};
use crate::store::Principal;

/// GET /api/auth/whoami - echo the resolved principal. Reaching this handler
/// at all means the resolver middleware accepted the credential.
pub async fn whoami(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}
