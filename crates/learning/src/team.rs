use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{CompanyId, CourseId, DomainResult, ProfileId, TeamCourseId, TeamId};

use crate::text;

/// A group of profiles inside a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTeam {
    pub id: TeamId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: ProfileId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDraft {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl CompanyTeam {
    pub fn create(company_id: CompanyId, created_by: ProfileId, draft: TeamDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: TeamId::new(),
            company_id,
            name: text::required("Name", &draft.name)?,
            description: text::optional(draft.description),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: TeamPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = patch.name {
            self.name = text::required("Name", &name)?;
        }
        if patch.description.is_some() {
            self.description = text::optional(patch.description);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    #[default]
    Member,
    Lead,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Member => "MEMBER",
            TeamRole::Lead => "LEAD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MEMBER" => Some(TeamRole::Member),
            "LEAD" => Some(TeamRole::Lead),
            _ => None,
        }
    }
}

/// Membership of a profile in a team, keyed by (team, profile).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMembership {
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub profile_id: ProfileId,
    pub role: TeamRole,
    pub added_by: ProfileId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMembership {
    /// Upsert semantics: an existing membership only gets its role replaced
    /// (when one is supplied); a new one defaults to `MEMBER`.
    pub fn upsert(
        existing: Option<TeamMembership>,
        team: &CompanyTeam,
        profile_id: ProfileId,
        role: Option<TeamRole>,
        actor: ProfileId,
        now: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(mut membership) => {
                if let Some(role) = role {
                    membership.role = role;
                }
                membership.updated_at = now;
                membership
            }
            None => Self {
                company_id: team.company_id,
                team_id: team.id,
                profile_id,
                role: role.unwrap_or_default(),
                added_by: actor,
                created_at: now,
                updated_at: now,
            },
        }
    }
}

impl learnhub_core::TenantScoped for TeamMembership {
    fn company_id(&self) -> CompanyId {
        self.company_id
    }
}

/// A course assigned to a whole team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCourseAssignment {
    pub id: TeamCourseId,
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub course_id: CourseId,
    pub assigned_by: ProfileId,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TeamCourseAssignment {
    pub fn new(
        team: &CompanyTeam,
        course_id: CourseId,
        assigned_by: ProfileId,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TeamCourseId::new(),
            company_id: team.company_id,
            team_id: team.id,
            course_id,
            assigned_by,
            due_at,
            created_at: now,
        }
    }
}

scoped_entity!(CompanyTeam, TeamId);
scoped_entity!(TeamCourseAssignment, TeamCourseId);
