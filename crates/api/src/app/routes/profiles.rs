use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, routing::get};
use chrono::Utc;

use learnhub_auth::{Action, Role};
use learnhub_learning::{ProfileDraft, UserProfile};

use crate::app::errors::ApiResult;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/profiles", get(list_profiles).post(create_profile))
}

pub async fn list_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    authz::require_roles(&ctx, &[Role::HrAdmin, Role::Trainer])?;
    Ok(Json(services.store().list_profiles(ctx.company_id()).await?))
}

/// Register an employee's identity inside the caller's company.
pub async fn create_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(draft): JsonBody<ProfileDraft>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    authz::require(&ctx, Action::ManageProfiles)?;
    let profile = services.workflows().create_profile(&ctx.actor(), draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}
