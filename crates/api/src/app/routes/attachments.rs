use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{delete, get},
};
use chrono::Utc;

use learnhub_core::{AttachmentId, CourseId};
use learnhub_learning::{Attachment, AttachmentDraft};

use crate::app::errors::ApiResult;
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::{editable_course, visible_course};
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/attachments", get(list_attachments).post(add_attachment))
        .route("/courses/:course_id/attachments/:attachment_id", delete(delete_attachment))
}

pub async fn list_attachments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Vec<Attachment>>> {
    visible_course(&services, &ctx, course_id).await?;
    Ok(Json(services.store().list_attachments(ctx.company_id(), course_id).await?))
}

/// Attaches to the course, or to one of its chapters or blocks (at most one).
pub async fn add_attachment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(draft): JsonBody<AttachmentDraft>,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    editable_course(&services, &ctx, course_id).await?;
    let attachment = services
        .workflows()
        .add_attachment(&ctx.actor(), course_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn delete_attachment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, attachment_id)): Ids<(CourseId, AttachmentId)>,
) -> ApiResult<StatusCode> {
    editable_course(&services, &ctx, course_id).await?;
    services
        .workflows()
        .delete_attachment(ctx.company_id(), course_id, attachment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
