use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{delete, get},
};
use chrono::Utc;

use learnhub_auth::Action;
use learnhub_core::{ProfileId, TeamCourseId, TeamId};
use learnhub_learning::{CompanyTeam, TeamCourseAssignment, TeamDraft, TeamMembership, TeamPatch};

use crate::app::dto::{AssignCourseRequest, AssignCourseResponse, MemberRequest};
use crate::app::errors::ApiResult;
use crate::app::extract::{Ids, JsonBody};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/:team_id", get(get_team).patch(update_team).delete(delete_team))
        .route("/teams/:team_id/members", get(list_members).post(upsert_member))
        .route("/teams/:team_id/members/:profile_id", delete(remove_member))
        .route("/teams/:team_id/courses", get(list_assignments).post(assign_course))
        .route("/teams/:team_id/courses/:assignment_id", delete(unassign_course))
}

pub async fn list_teams(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<CompanyTeam>>> {
    Ok(Json(services.store().list_teams(ctx.company_id()).await?))
}

pub async fn create_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(draft): JsonBody<TeamDraft>,
) -> ApiResult<(StatusCode, Json<CompanyTeam>)> {
    authz::require(&ctx, Action::ManageTeams)?;
    let team = services.workflows().create_team(&ctx.actor(), draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
) -> ApiResult<Json<CompanyTeam>> {
    Ok(Json(services.store().get_team(ctx.company_id(), team_id).await?))
}

pub async fn update_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
    JsonBody(patch): JsonBody<TeamPatch>,
) -> ApiResult<Json<CompanyTeam>> {
    authz::require(&ctx, Action::ManageTeams)?;
    let team = services
        .workflows()
        .update_team(ctx.company_id(), team_id, patch, Utc::now())
        .await?;
    Ok(Json(team))
}

pub async fn delete_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
) -> ApiResult<StatusCode> {
    authz::require(&ctx, Action::ManageTeams)?;
    services.workflows().delete_team(ctx.company_id(), team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
) -> ApiResult<Json<Vec<TeamMembership>>> {
    Ok(Json(services.store().list_members(ctx.company_id(), team_id).await?))
}

/// Adds the profile, or updates its role if it is already a member.
pub async fn upsert_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
    JsonBody(body): JsonBody<MemberRequest>,
) -> ApiResult<(StatusCode, Json<TeamMembership>)> {
    authz::require(&ctx, Action::AddTeamMember)?;
    let membership = services
        .workflows()
        .upsert_member(&ctx.actor(), team_id, body.profile_id, body.role, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

/// Trainers may only remove members they added.
pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((team_id, profile_id)): Ids<(TeamId, ProfileId)>,
) -> ApiResult<StatusCode> {
    let membership = services.store().get_member(ctx.company_id(), team_id, profile_id).await?;
    authz::require_member_remover(&ctx, &membership)?;
    services
        .workflows()
        .remove_member(ctx.company_id(), team_id, profile_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_assignments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
) -> ApiResult<Json<Vec<TeamCourseAssignment>>> {
    Ok(Json(services.store().list_assignments(ctx.company_id(), team_id).await?))
}

/// Assigns a course and enrolls every current member not yet enrolled.
pub async fn assign_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(team_id): Ids<TeamId>,
    JsonBody(body): JsonBody<AssignCourseRequest>,
) -> ApiResult<(StatusCode, Json<AssignCourseResponse>)> {
    authz::require(&ctx, Action::AssignTeamCourse)?;
    let (assignment, enrolled) = services
        .workflows()
        .assign_course(&ctx.actor(), team_id, body.course_id, body.due_at, Utc::now())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AssignCourseResponse {
            assignment,
            enrolled: enrolled.len(),
        }),
    ))
}

pub async fn unassign_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((team_id, assignment_id)): Ids<(TeamId, TeamCourseId)>,
) -> ApiResult<StatusCode> {
    let assignment = services
        .store()
        .get_assignment(ctx.company_id(), team_id, assignment_id)
        .await?;
    authz::require_assignment_remover(&ctx, &assignment)?;
    services
        .workflows()
        .unassign_course(ctx.company_id(), team_id, assignment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
