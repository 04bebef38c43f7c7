use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_auth::{IdentityId, Role};
use learnhub_core::{CompanyId, DomainResult, ProfileId};

use crate::text;

/// Tenant boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn create(name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: CompanyId::new(),
            name: text::required("Company name", name)?,
            created_at: now,
        })
    }
}

impl learnhub_core::Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An employee's profile inside exactly one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ProfileId,
    pub company_id: CompanyId,
    pub identity_id: IdentityId,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub identity_id: IdentityId,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl UserProfile {
    pub fn create(company_id: CompanyId, draft: ProfileDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        if draft.identity_id.as_str().trim().is_empty() {
            return Err(learnhub_core::DomainError::validation("Identity is required"));
        }
        Ok(Self {
            id: ProfileId::new(),
            company_id,
            identity_id: draft.identity_id,
            display_name: text::required("Display name", &draft.display_name)?,
            email: text::optional(draft.email),
            role: draft.role,
            created_at: now,
        })
    }
}

scoped_entity!(UserProfile, ProfileId);
