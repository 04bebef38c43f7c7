use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, routing::get};
use chrono::Utc;

use learnhub_auth::Action;
use learnhub_learning::{Badge, BadgeDraft};

use crate::app::errors::ApiResult;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/badges", get(list_badges).post(create_badge))
}

/// Global badges first, then the company's own.
pub async fn list_badges(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<Badge>>> {
    Ok(Json(services.store().list_badges(ctx.company_id()).await?))
}

pub async fn create_badge(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(draft): JsonBody<BadgeDraft>,
) -> ApiResult<(StatusCode, Json<Badge>)> {
    authz::require(&ctx, Action::CreateBadge)?;
    let badge = services.workflows().create_badge(&ctx.actor(), draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(badge)))
}
