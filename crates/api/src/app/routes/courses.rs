use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, patch},
};
use chrono::Utc;

use learnhub_auth::Action;
use learnhub_core::CourseId;
use learnhub_learning::{Course, CourseDraft, CoursePatch};

use crate::app::errors::ApiResult;
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::{can_see, editable_course, visible_course};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:course_id", get(get_course).patch(update_course).delete(delete_course))
        .route("/courses/:course_id/publish", patch(publish_course))
        .route("/courses/:course_id/unpublish", patch(unpublish_course))
}

pub async fn list_courses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<Course>>> {
    let courses = services.store().list_courses(ctx.company_id()).await?;
    Ok(Json(courses.into_iter().filter(|c| can_see(&ctx, c)).collect()))
}

/// Creates an unpublished course; the creator is enrolled in it.
pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(draft): JsonBody<CourseDraft>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    authz::require(&ctx, Action::CreateCourse)?;
    let (course, _) = services.workflows().create_course(&ctx.actor(), draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Course>> {
    Ok(Json(visible_course(&services, &ctx, course_id).await?))
}

pub async fn update_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(patch): JsonBody<CoursePatch>,
) -> ApiResult<Json<Course>> {
    editable_course(&services, &ctx, course_id).await?;
    let course = services
        .workflows()
        .update_course(ctx.company_id(), course_id, patch, Utc::now())
        .await?;
    Ok(Json(course))
}

pub async fn delete_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<StatusCode> {
    editable_course(&services, &ctx, course_id).await?;
    services.workflows().delete_course(ctx.company_id(), course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flips the flag and mirrors curriculum modules into legacy chapters.
pub async fn publish_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Course>> {
    editable_course(&services, &ctx, course_id).await?;
    let course = services
        .workflows()
        .publish_course(ctx.company_id(), course_id, Utc::now())
        .await?;
    Ok(Json(course))
}

pub async fn unpublish_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Course>> {
    editable_course(&services, &ctx, course_id).await?;
    let course = services
        .workflows()
        .unpublish_course(ctx.company_id(), course_id, Utc::now())
        .await?;
    Ok(Json(course))
}
