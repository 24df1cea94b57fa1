//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage selection and construction of the auth core
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent response envelopes

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: ApiConfig) -> anyhow::Result<Router> {
    let (services, auth_state) = services::build_services(&config).await?;
    Ok(router(Arc::new(services), auth_state))
}

/// Assemble the router over already-built services.
pub fn router(services: Arc<services::AppServices>, auth_state: middleware::AuthState) -> Router {
    // Every request gets a security context; route guards decide access.
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
}
