use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{ChapterId, CompanyId, CourseId, DomainError, DomainResult, ModuleId};

use crate::{Course, text};

/// A chapter of a course.
///
/// Publication state machine:
/// - `Unpublished → Published` requires title, description and one of
///   video / content URL.
/// - `Published → Unpublished` is unconditional; the owning course is then
///   re-evaluated (see [`crate::publication`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub content_url: Option<String>,
    pub position: i32,
    pub is_published: bool,
    /// Set when the chapter mirrors a curriculum module.
    pub source_module_id: Option<ModuleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDraft {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub content_url: Option<String>,
}

/// Partial update. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub content_url: Option<String>,
}

impl Chapter {
    /// Build a chapter at `position` (callers compute it with [`crate::next_position`]).
    pub fn create(course: &Course, draft: ChapterDraft, position: i32, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: ChapterId::new(),
            company_id: course.company_id,
            course_id: course.id,
            title: text::required("Title", &draft.title)?,
            description: text::optional(draft.description),
            video_url: text::optional(draft.video_url),
            content_url: text::optional(draft.content_url),
            position,
            is_published: false,
            source_module_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: ChapterPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(title) = patch.title {
            self.title = text::required("Title", &title)?;
        }
        if patch.description.is_some() {
            self.description = text::optional(patch.description);
        }
        if patch.video_url.is_some() {
            self.video_url = text::optional(patch.video_url);
        }
        if patch.content_url.is_some() {
            self.content_url = text::optional(patch.content_url);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Title, description, and at least one of video / content URL.
    pub fn is_content_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && text::is_present(&self.description)
            && (text::is_present(&self.video_url) || text::is_present(&self.content_url))
    }

    pub fn publish(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_content_complete() {
            return Err(DomainError::validation("Missing required fields"));
        }
        self.is_published = true;
        self.updated_at = now;
        Ok(())
    }

    /// Returns `true` if the chapter was published before.
    pub fn unpublish(&mut self, now: DateTime<Utc>) -> bool {
        let was_published = self.is_published;
        self.is_published = false;
        self.updated_at = now;
        was_published
    }
}

scoped_entity!(Chapter, ChapterId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CourseDraft;
    use learnhub_core::ProfileId;

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

    fn intro(course: &Course) -> Chapter {
        Chapter::create(
            course,
            ChapterDraft {
                title: "Intro".into(),
                ..Default::default()
            },
            1,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn chapter_inherits_course_scope() {
        let course = course();
        let chapter = intro(&course);
        assert_eq!(chapter.course_id, course.id);
        assert_eq!(chapter.company_id, course.company_id);
        assert!(!chapter.is_published);
    }

    #[test]
    fn publish_without_content_is_rejected() {
        let mut chapter = intro(&course());
        let err = chapter.publish(Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("Missing required fields"));
        assert!(!chapter.is_published);
    }

    #[test]
    fn publish_requires_description_even_with_video() {
        let mut chapter = intro(&course());
        chapter.video_url = Some("https://cdn.example.com/intro.mp4".into());
        assert!(chapter.publish(Utc::now()).is_err());

        chapter.description = Some("Welcome aboard".into());
        chapter.publish(Utc::now()).unwrap();
        assert!(chapter.is_published);
    }

    #[test]
    fn content_url_is_an_alternative_to_video() {
        let mut chapter = intro(&course());
        chapter.description = Some("Read me".into());
        chapter.content_url = Some("https://cdn.example.com/intro.pdf".into());
        assert!(chapter.publish(Utc::now()).is_ok());
    }

    #[test]
    fn whitespace_fields_do_not_count_as_content() {
        let mut chapter = intro(&course());
        chapter.description = Some("   ".into());
        chapter.video_url = Some(" ".into());
        assert!(!chapter.is_content_complete());
    }

    #[test]
    fn unpublish_is_unconditional() {
        let mut chapter = intro(&course());
        assert!(!chapter.unpublish(Utc::now()));
        chapter.description = Some("d".into());
        chapter.video_url = Some("v".into());
        chapter.publish(Utc::now()).unwrap();
        assert!(chapter.unpublish(Utc::now()));
        assert!(!chapter.is_published);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn field() -> impl Strategy<Value = Option<String>> {
            prop_oneof![Just(None), Just(Some(String::new())), Just(Some("  ".to_string())), "[a-z]{1,12}".prop_map(Some)]
        }

        proptest! {
            /// Property: publishing succeeds exactly when the content is complete.
            #[test]
            fn publish_succeeds_iff_content_complete(
                description in field(),
                video_url in field(),
                content_url in field(),
            ) {
                let mut chapter = intro(&course());
                chapter.description = description.clone();
                chapter.video_url = video_url.clone();
                chapter.content_url = content_url.clone();

                let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
                let complete = present(&description) && (present(&video_url) || present(&content_url));

                prop_assert_eq!(chapter.publish(Utc::now()).is_ok(), complete);
                prop_assert_eq!(chapter.is_published, complete);
            }
        }
    }
}
