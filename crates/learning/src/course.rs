use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{CompanyId, CourseId, DomainResult, ProfileId};

use crate::text;

/// Course aggregate root. Chapters and curriculum hang off it by `course_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub company_id: CompanyId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_by: ProfileId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Course {
    /// New courses always start unpublished.
    pub fn create(
        company_id: CompanyId,
        created_by: ProfileId,
        draft: CourseDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: CourseId::new(),
            company_id,
            title: text::required("Title", &draft.title)?,
            description: text::optional(draft.description),
            image_url: text::optional(draft.image_url),
            is_published: false,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: CoursePatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(title) = patch.title {
            self.title = text::required("Title", &title)?;
        }
        if patch.description.is_some() {
            self.description = text::optional(patch.description);
        }
        if patch.image_url.is_some() {
            self.image_url = text::optional(patch.image_url);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Precondition-free: who may publish is decided by the capability policy.
    pub fn publish(&mut self, now: DateTime<Utc>) {
        self.is_published = true;
        self.updated_at = now;
    }

    /// Returns `true` if the flag changed.
    pub fn unpublish(&mut self, now: DateTime<Utc>) -> bool {
        let changed = self.is_published;
        self.is_published = false;
        self.updated_at = now;
        changed
    }
}

scoped_entity!(Course, CourseId);

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_core::DomainError;

    fn onboarding() -> Course {
        Course::create(
            CompanyId::new(),
            ProfileId::new(),
            CourseDraft {
                title: "Onboarding".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn created_course_is_unpublished() {
        let course = onboarding();
        assert!(!course.is_published);
        assert_eq!(course.title, "Onboarding");
    }

    #[test]
    fn create_rejects_blank_title() {
        let err = Course::create(CompanyId::new(), ProfileId::new(), CourseDraft::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut course = onboarding();
        course
            .apply_patch(
                CoursePatch {
                    description: Some("Welcome".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(course.title, "Onboarding");
        assert_eq!(course.description.as_deref(), Some("Welcome"));

        course
            .apply_patch(
                CoursePatch {
                    description: Some(String::new()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(course.description, None);
    }

    #[test]
    fn unpublish_reports_whether_it_changed() {
        let mut course = onboarding();
        assert!(!course.unpublish(Utc::now()));
        course.publish(Utc::now());
        assert!(course.is_published);
        assert!(course.unpublish(Utc::now()));
    }
}
