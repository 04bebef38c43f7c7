use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, patch, put},
};
use chrono::Utc;

use learnhub_auth::Role;
use learnhub_core::{ChapterId, CourseId};
use learnhub_learning::{CascadeOutcome, Chapter, ChapterDraft, ChapterPatch};

use crate::app::dto::{ChapterUnpublishedResponse, ReorderRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::{editable_course, visible_course};
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/chapters", get(list_chapters).post(create_chapter))
        .route("/courses/:course_id/chapters/reorder", put(reorder_chapters))
        .route(
            "/courses/:course_id/chapters/:chapter_id",
            get(get_chapter).patch(update_chapter).delete(delete_chapter),
        )
        .route("/courses/:course_id/chapters/:chapter_id/publish", patch(publish_chapter))
        .route("/courses/:course_id/chapters/:chapter_id/unpublish", patch(unpublish_chapter))
}

fn chapter_visible(ctx: &RequestContext, chapter: &Chapter) -> bool {
    chapter.is_published || ctx.role() != Role::Learner
}

/// Position order; learners only get published chapters of published courses.
pub async fn list_chapters(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Vec<Chapter>>> {
    visible_course(&services, &ctx, course_id).await?;
    let chapters = services.store().list_chapters(ctx.company_id(), course_id).await?;
    Ok(Json(chapters.into_iter().filter(|c| chapter_visible(&ctx, c)).collect()))
}

pub async fn get_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, chapter_id)): Ids<(CourseId, ChapterId)>,
) -> ApiResult<Json<Chapter>> {
    visible_course(&services, &ctx, course_id).await?;
    let chapter = services.store().get_chapter(ctx.company_id(), course_id, chapter_id).await?;
    if !chapter_visible(&ctx, &chapter) {
        return Err(ApiError::NotFound("Chapter"));
    }
    Ok(Json(chapter))
}

/// Appends the chapter at the end of the course, unpublished.
pub async fn create_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(draft): JsonBody<ChapterDraft>,
) -> ApiResult<(StatusCode, Json<Chapter>)> {
    editable_course(&services, &ctx, course_id).await?;
    let chapter = services
        .workflows()
        .append_chapter(ctx.company_id(), course_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

pub async fn update_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, chapter_id)): Ids<(CourseId, ChapterId)>,
    JsonBody(patch): JsonBody<ChapterPatch>,
) -> ApiResult<Json<Chapter>> {
    editable_course(&services, &ctx, course_id).await?;
    let chapter = services
        .workflows()
        .update_chapter(ctx.company_id(), course_id, chapter_id, patch, Utc::now())
        .await?;
    Ok(Json(chapter))
}

pub async fn delete_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, chapter_id)): Ids<(CourseId, ChapterId)>,
) -> ApiResult<StatusCode> {
    editable_course(&services, &ctx, course_id).await?;
    services
        .workflows()
        .delete_chapter(ctx.company_id(), course_id, chapter_id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, chapter_id)): Ids<(CourseId, ChapterId)>,
) -> ApiResult<Json<Chapter>> {
    editable_course(&services, &ctx, course_id).await?;
    let chapter = services
        .workflows()
        .publish_chapter(ctx.company_id(), course_id, chapter_id, Utc::now())
        .await?;
    Ok(Json(chapter))
}

/// Unpublishing the last published chapter also unpublishes the course.
pub async fn unpublish_chapter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, chapter_id)): Ids<(CourseId, ChapterId)>,
) -> ApiResult<Json<ChapterUnpublishedResponse>> {
    editable_course(&services, &ctx, course_id).await?;
    let (chapter, outcome) = services
        .workflows()
        .unpublish_chapter(ctx.company_id(), course_id, chapter_id, Utc::now())
        .await?;
    Ok(Json(ChapterUnpublishedResponse {
        chapter,
        course_unpublished: outcome == CascadeOutcome::CourseUnpublished,
    }))
}

pub async fn reorder_chapters(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(body): JsonBody<ReorderRequest>,
) -> ApiResult<StatusCode> {
    editable_course(&services, &ctx, course_id).await?;
    services
        .workflows()
        .reorder_chapters(ctx.company_id(), course_id, &body.list, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
