use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use learnhub_core::{CourseId, LessonId, ModuleId};
use learnhub_learning::{BlockDraft, CourseModule, Lesson, LessonBlock, LessonDraft, ModuleDraft};

use crate::app::dto::{ModuleView, curriculum_tree};
use crate::app::errors::ApiResult;
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::{editable_course, visible_course};
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/modules", get(curriculum).post(create_module))
        .route("/courses/:course_id/modules/:module_id/lessons", post(create_lesson))
        .route("/courses/:course_id/lessons/:lesson_id/blocks", post(create_block))
}

/// Module → lesson → block tree of a course.
pub async fn curriculum(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Vec<ModuleView>>> {
    visible_course(&services, &ctx, course_id).await?;
    let store = services.store();
    let company_id = ctx.company_id();
    let modules = store.list_modules(company_id, course_id).await?;
    let lessons = store.list_lessons(company_id, course_id).await?;
    let blocks = store.list_blocks(company_id, course_id).await?;
    Ok(Json(curriculum_tree(modules, lessons, blocks)))
}

pub async fn create_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(draft): JsonBody<ModuleDraft>,
) -> ApiResult<(StatusCode, Json<CourseModule>)> {
    editable_course(&services, &ctx, course_id).await?;
    let module = services
        .workflows()
        .append_module(ctx.company_id(), course_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn create_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, module_id)): Ids<(CourseId, ModuleId)>,
    JsonBody(draft): JsonBody<LessonDraft>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    editable_course(&services, &ctx, course_id).await?;
    let lesson = services
        .workflows()
        .append_lesson(ctx.company_id(), course_id, module_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn create_block(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, lesson_id)): Ids<(CourseId, LessonId)>,
    JsonBody(draft): JsonBody<BlockDraft>,
) -> ApiResult<(StatusCode, Json<LessonBlock>)> {
    editable_course(&services, &ctx, course_id).await?;
    let block = services
        .workflows()
        .append_block(ctx.company_id(), course_id, lesson_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(block)))
}
