use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use learnhub_auth::JwtValidator;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{IdentityContext, RequestContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Validates the bearer token and attaches the [`IdentityContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(reason = %e, "rejected bearer token");
        ApiError::Unauthenticated
    })?;

    req.extensions_mut().insert(IdentityContext::from_claims(claims));

    Ok(next.run(req).await)
}

/// Resolves the identity's profile and company into a [`RequestContext`].
///
/// Must run inside [`auth_middleware`]. An identity without a profile gets 404.
pub async fn tenant_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = req
        .extensions()
        .get::<IdentityContext>()
        .ok_or(ApiError::Unauthenticated)?
        .identity()
        .clone();

    let profile = services
        .store()
        .find_profile_by_identity(&identity)
        .await?
        .ok_or(ApiError::NotFound("Profile"))?;
    let company = services.store().get_company(profile.company_id).await?;

    req.extensions_mut().insert(RequestContext::new(identity, profile, company));

    Ok(next.run(req).await)
}

/// One log line per request with status and latency.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::Unauthenticated)?;

    let header = header.to_str().map_err(|_| ApiError::Unauthenticated)?;

    let header = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthenticated)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }

    Ok(token)
}
