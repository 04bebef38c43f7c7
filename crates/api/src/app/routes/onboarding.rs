use std::sync::Arc;

use axum::{Extension, Json, http::StatusCode};
use chrono::Utc;

use crate::app::dto::{OnboardingRequest, OnboardingResponse};
use crate::app::errors::ApiResult;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::IdentityContext;

/// Create a company; the caller becomes its first HR admin.
pub async fn onboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    JsonBody(body): JsonBody<OnboardingRequest>,
) -> ApiResult<(StatusCode, Json<OnboardingResponse>)> {
    let display_name = body
        .display_name
        .or_else(|| identity.name().map(str::to_string))
        .or_else(|| identity.email().map(str::to_string))
        .unwrap_or_else(|| identity.identity().to_string());

    let (company, profile) = services
        .workflows()
        .onboard(
            identity.identity(),
            &body.company_name,
            &display_name,
            identity.email().map(str::to_string),
            Utc::now(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(OnboardingResponse { company, profile })))
}
