use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, patch},
};
use chrono::Utc;

use learnhub_auth::{Action, Role};
use learnhub_core::{CourseId, EnrollmentId};
use learnhub_learning::Enrollment;

use crate::app::dto::{EnrollRequest, ProgressRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::visible_course;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/enrollments", get(list_course_enrollments).post(enroll))
        .route("/me/enrollments", get(my_enrollments))
        .route("/enrollments/:enrollment_id/progress", patch(record_progress))
}

/// 201 when a new enrollment was created, 200 when the profile was already enrolled.
pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
    JsonBody(body): JsonBody<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    authz::require(&ctx, Action::EnrollProfile)?;
    services.store().get_course(ctx.company_id(), course_id).await?;
    services.store().get_profile(ctx.company_id(), body.profile_id).await?;

    let (enrollment, created) = services
        .workflows()
        .enroll(&ctx.actor(), course_id, body.profile_id, Utc::now())
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(enrollment)))
}

pub async fn list_course_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(course_id): Ids<CourseId>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    authz::require_roles(&ctx, &[Role::HrAdmin, Role::Trainer])?;
    visible_course(&services, &ctx, course_id).await?;
    Ok(Json(
        services.store().list_course_enrollments(ctx.company_id(), course_id).await?,
    ))
}

pub async fn my_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    Ok(Json(
        services
            .store()
            .list_profile_enrollments(ctx.company_id(), ctx.profile_id())
            .await?,
    ))
}

/// Only the enrolled profile reports its own progress; 100 completes the enrollment.
pub async fn record_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(enrollment_id): Ids<EnrollmentId>,
    JsonBody(body): JsonBody<ProgressRequest>,
) -> ApiResult<Json<Enrollment>> {
    let progress = body
        .percent()
        .ok_or_else(|| ApiError::invalid("Progress must be between 0 and 100"))?;

    let enrollment = services.store().get_enrollment(ctx.company_id(), enrollment_id).await?;
    authz::require_progress_owner(&ctx, &enrollment)?;

    let enrollment = services
        .workflows()
        .record_progress(ctx.company_id(), enrollment_id, progress, Utc::now())
        .await?;
    Ok(Json(enrollment))
}
