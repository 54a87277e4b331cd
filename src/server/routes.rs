// src/server/routes.rs
//! Axum router configuration for the depot server
//!
//! Fixed endpoints (`/health`, `/ready`, `/repos`) are routed directly;
//! everything under `/repo/` funnels into one dispatcher because
//! repository names span multiple path segments.

use crate::server::{handlers, ServerState};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route(
            "/repos",
            get(handlers::list_repos).post(handlers::create_repo),
        )
        .route(
            "/repo/*path",
            get(handlers::repo_dispatch)
                .post(handlers::repo_dispatch)
                .delete(handlers::repo_dispatch),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Bearer-token check on mutating methods. A plain string compare; no
/// token configured means the check is off.
async fn require_bearer(
    State(state): State<Arc<ServerState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.config.auth_token {
        let mutating = matches!(*req.method(), Method::POST | Method::PUT | Method::DELETE);
        if mutating {
            let presented = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));
            if presented != Some(expected.as_str()) {
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    "missing or invalid bearer token",
                )
                    .into_response();
            }
        }
    }
    next.run(req).await
}
