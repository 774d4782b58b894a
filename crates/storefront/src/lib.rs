//! LESE Metalcraft storefront library.
//!
//! Exposes the server's modules so handlers, the backend client and the
//! view models can be tested outside the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seo;
pub mod state;

use std::path::Path;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;

/// Build the full application router.
///
/// Layers run outermost first: tracing, request id, CSP nonce, security
/// headers, then the session layer closest to the handlers.
pub fn app(state: AppState, session_store: PostgresStore, static_dir: &Path) -> Router {
    let session_layer = middleware::create_session_layer(session_store, state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(state.config().trust_proxy_headers))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(session_layer)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::csp_nonce_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check. Does not touch dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness check: the session database and the managed backend must answer.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let (database, backend) = tokio::join!(
        sqlx::query("SELECT 1").fetch_one(state.pool()),
        state.backend().ping(),
    );

    match (database, backend) {
        (Ok(_), Ok(())) => StatusCode::OK,
        (Err(e), _) => {
            tracing::warn!(error = %e, "Readiness: session database unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Readiness: backend unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found(
    State(state): State<AppState>,
    nonce: middleware::CspNonce,
    middleware::OptionalAuth(user): middleware::OptionalAuth,
) -> axum::response::Response {
    let meta = seo::PageMeta::not_found(state.config());
    let ctx = routes::PageContext::new(&state, nonce, user.as_ref(), meta).await;
    routes::NotFoundTemplate::respond(ctx)
}
