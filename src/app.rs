use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::auth;
use crate::middleware::resolve::principal_middleware;
use crate::state::AppState;

/// Assemble the full application router. Public routes sit outside the
/// resolver; everything under /api requires a resolved principal.
pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.server.enable_cors;

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_auth_routes())
        .merge(protected_auth_routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/google", post(auth::google_sign_in))
}

fn protected_auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .layer(from_fn_with_state(state, principal_middleware))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "status": "ok",
        "data": {
            "name": "Cafe API (Rust)",
            "version": version,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "POST /auth/login (public - token acquisition)",
                "google": "POST /auth/google (public - federated sign-in)",
                "whoami": "GET /api/auth/whoami (protected)",
            }
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
