//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and workflow wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `extract.rs`: extractors with plain-text 400 rejections
//! - `errors.rs`: error taxonomy and status mapping

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use learnhub_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let jwt = Arc::new(learnhub_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(&config).await?);

    // Tenant routes: require a profile inside a company.
    let tenant = routes::router().layer(axum::middleware::from_fn_with_state(
        services.clone(),
        middleware::tenant_middleware,
    ));

    // Authenticated routes: identity required, profile optional.
    let authenticated = Router::new()
        .route("/whoami", get(routes::system::whoami))
        .route("/onboarding", post(routes::onboarding::onboard))
        .merge(tenant)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(authenticated)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests))))
}
