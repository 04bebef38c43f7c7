use learnhub_auth::Role;
use learnhub_core::CourseId;
use learnhub_learning::Course;

use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

/// Learners only see published courses; to them a draft does not exist.
pub fn can_see(ctx: &RequestContext, course: &Course) -> bool {
    course.is_published || ctx.role() != Role::Learner
}

/// Load a course the caller may read.
pub async fn visible_course(services: &AppServices, ctx: &RequestContext, course_id: CourseId) -> ApiResult<Course> {
    let course = services.store().get_course(ctx.company_id(), course_id).await?;
    if !can_see(ctx, &course) {
        return Err(ApiError::NotFound("Course"));
    }
    Ok(course)
}

/// Load a course the caller may edit (HR admin, or the trainer who created it).
pub async fn editable_course(services: &AppServices, ctx: &RequestContext, course_id: CourseId) -> ApiResult<Course> {
    let course = services.store().get_course(ctx.company_id(), course_id).await?;
    authz::require_course_editor(ctx, &course)?;
    Ok(course)
}
