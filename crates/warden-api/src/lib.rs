//! # warden-api — Axum API Services
//!
//! The HTTP service layer for Warden, built on Axum/Tower/Tokio. Assembles
//! the login and principal routers into a single application with shared
//! middleware for tracing, rate limiting, authentication and role gates.
//!
//! ## Routes
//!
//! - `{prefix}/auth/login/*`: code-based login (LOGIN zone)
//! - `{prefix}/user/info`: the caller's profile (authenticated)
//! - `{prefix}/user/admin/ping`: admin ping (authenticated, role-gated)
//! - `/openapi.json`: generated OpenAPI document
//! - `/health/*`: Kubernetes health checks (unauthenticated, ungated)
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → RateLimit(GLOBAL) → [RateLimit(LOGIN) | Auth → RoleGate]
//!
//! ## Crate Policy
//!
//! - Sits at the top of the dependency DAG.
//! - No business logic in route handlers; login flows live in [`login`].
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod login;
pub mod middleware;
pub mod openapi;
pub mod role_cache;
pub mod routes;
pub mod state;

#[cfg(test)]
mod testing;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use warden_core::ErrorKind;

use crate::middleware::rate_limit::{rate_limit_middleware, RateLimitGate};

pub use config::AppConfig;
pub use error::{ApiResponse, AppError};
pub use state::{AppState, Collaborators};

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    let limits = &state.config.rate_limit;
    let global_gate = RateLimitGate::new("GLOBAL", limits.global_per_minute);
    let login_gate = RateLimitGate::new("LOGIN", limits.login_per_minute);

    let login = routes::auth::router().route_layer(from_fn_with_state(
        (state.limiter.clone(), login_gate),
        rate_limit_middleware,
    ));

    let user = routes::user::router(&state)
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    let prefixed = login.merge(user);
    let api = match state.config.server.mount_prefix() {
        Some(prefix) => Router::new().nest(&prefix, prefixed),
        None => prefixed,
    };

    let api = api
        .merge(openapi::router())
        .fallback(not_found)
        .layer(from_fn_with_state(
            (state.limiter.clone(), global_gate),
            rate_limit_middleware,
        ))
        .layer(middleware::tracing_layer::layer())
        .with_state(state);

    // Unauthenticated health checks.
    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::new(ErrorKind::NotFound).append(uri.path().to_string())
}
