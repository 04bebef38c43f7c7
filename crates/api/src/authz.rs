//! API-side authorization guard.
//!
//! Handlers compute who owns the resource they are about to touch and ask the
//! capability policy before calling a workflow. Domain and infra stay
//! auth-agnostic.

use learnhub_auth::{Action, Ownership, Role, authorize, require_role};
use learnhub_core::ProfileId;
use learnhub_learning::{Course, Enrollment, TeamCourseAssignment, TeamMembership};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

/// Role gate: the caller's role must be one of `allowed`.
pub fn require_roles(ctx: &RequestContext, allowed: &[Role]) -> Result<(), ApiError> {
    Ok(require_role(ctx.role(), allowed)?)
}

/// Capability check for actions that do not target an owned resource.
pub fn require(ctx: &RequestContext, action: Action) -> Result<(), ApiError> {
    Ok(authorize(ctx.role(), action, Ownership::NotApplicable)?)
}

/// Capability check against the recorded owner of a resource.
pub fn require_owned(ctx: &RequestContext, action: Action, owner: Option<ProfileId>) -> Result<(), ApiError> {
    Ok(authorize(ctx.role(), action, Ownership::of(ctx.profile_id(), owner))?)
}

pub fn require_course_editor(ctx: &RequestContext, course: &Course) -> Result<(), ApiError> {
    require_owned(ctx, Action::EditCourse, Some(course.created_by))
}

pub fn require_member_remover(ctx: &RequestContext, membership: &TeamMembership) -> Result<(), ApiError> {
    require_owned(ctx, Action::RemoveTeamMember, Some(membership.added_by))
}

pub fn require_assignment_remover(ctx: &RequestContext, assignment: &TeamCourseAssignment) -> Result<(), ApiError> {
    require_owned(ctx, Action::UnassignTeamCourse, Some(assignment.assigned_by))
}

/// Progress belongs to the enrolled profile, whatever the caller's role.
pub fn require_progress_owner(ctx: &RequestContext, enrollment: &Enrollment) -> Result<(), ApiError> {
    require_owned(ctx, Action::TrackProgress, Some(enrollment.profile_id))?;
    if enrollment.profile_id != ctx.profile_id() {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
