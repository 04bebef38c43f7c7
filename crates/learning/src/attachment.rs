use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{AttachmentId, BlockId, ChapterId, CompanyId, CourseId, DomainResult, ProfileId};

use crate::{Course, text};

/// What an attachment hangs off. Chapter and block targets must belong to the
/// attachment's course; the store checks that on insert.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "targetType", content = "targetId", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentTarget {
    Course,
    Chapter(ChapterId),
    Block(BlockId),
}

impl AttachmentTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            AttachmentTarget::Course => "COURSE",
            AttachmentTarget::Chapter(_) => "CHAPTER",
            AttachmentTarget::Block(_) => "BLOCK",
        }
    }
}

/// A link to a file stored elsewhere. Only the URL is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    #[serde(flatten)]
    pub target: AttachmentTarget,
    pub name: String,
    pub url: String,
    pub uploaded_by: ProfileId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDraft {
    pub name: String,
    pub url: String,
    pub chapter_id: Option<ChapterId>,
    pub block_id: Option<BlockId>,
}

impl AttachmentDraft {
    /// At most one of `chapter_id` / `block_id`; neither means the course itself.
    pub fn target(&self) -> DomainResult<AttachmentTarget> {
        match (self.chapter_id, self.block_id) {
            (None, None) => Ok(AttachmentTarget::Course),
            (Some(chapter), None) => Ok(AttachmentTarget::Chapter(chapter)),
            (None, Some(block)) => Ok(AttachmentTarget::Block(block)),
            (Some(_), Some(_)) => Err(learnhub_core::DomainError::validation(
                "Attachment targets either a chapter or a block, not both",
            )),
        }
    }
}

impl Attachment {
    pub fn create(course: &Course, uploaded_by: ProfileId, draft: AttachmentDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let target = draft.target()?;
        Ok(Self {
            id: AttachmentId::new(),
            company_id: course.company_id,
            course_id: course.id,
            target,
            name: text::required("Name", &draft.name)?,
            url: text::required("Url", &draft.url)?,
            uploaded_by,
            created_at: now,
        })
    }
}

scoped_entity!(Attachment, AttachmentId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CourseDraft;

    fn course() -> Course {
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
    fn draft_without_ids_targets_the_course() {
        let course = course();
        let a = Attachment::create(
            &course,
            course.created_by,
            AttachmentDraft {
                name: "Handbook".into(),
                url: "https://files.example/handbook.pdf".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(a.target, AttachmentTarget::Course);
        assert_eq!(a.course_id, course.id);
    }

    #[test]
    fn draft_with_both_targets_is_rejected() {
        let draft = AttachmentDraft {
            name: "x".into(),
            url: "y".into(),
            chapter_id: Some(ChapterId::new()),
            block_id: Some(BlockId::new()),
        };
        assert!(draft.target().is_err());
    }

    #[test]
    fn url_is_required() {
        let course = course();
        let err = Attachment::create(
            &course,
            course.created_by,
            AttachmentDraft {
                name: "Handbook".into(),
                url: " ".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn target_serializes_with_type_and_id() {
        let chapter = ChapterId::new();
        let json = serde_json::to_value(AttachmentTarget::Chapter(chapter)).unwrap();
        assert_eq!(json["targetType"], "CHAPTER");
        assert_eq!(json["targetId"], chapter.to_string());
    }
}
