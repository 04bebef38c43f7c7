use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{BadgeId, CompanyId, DomainResult, ProfileId};

use crate::text;

/// A badge owned by a company, or global when `company_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: BadgeId,
    pub company_id: Option<CompanyId>,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDraft {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Badge {
    pub fn create(company_id: CompanyId, created_by: ProfileId, draft: BadgeDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: BadgeId::new(),
            company_id: Some(company_id),
            name: text::required("Name", &draft.name)?,
            description: text::optional(draft.description),
            image_url: text::optional(draft.image_url),
            created_by: Some(created_by),
            created_at: now,
        })
    }

    /// Seeded badges shared by every company.
    pub fn global(draft: BadgeDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: BadgeId::new(),
            company_id: None,
            name: text::required("Name", &draft.name)?,
            description: text::optional(draft.description),
            image_url: text::optional(draft.image_url),
            created_by: None,
            created_at: now,
        })
    }

    pub fn is_global(&self) -> bool {
        self.company_id.is_none()
    }

    /// Global badges are visible to everyone, tenant badges only to their company.
    pub fn is_visible_to(&self, company_id: CompanyId) -> bool {
        self.company_id.is_none_or(|owner| owner == company_id)
    }
}

impl learnhub_core::Entity for Badge {
    type Id = BadgeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
