//! Module → lesson → block hierarchy of a course.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{BlockId, CompanyId, CourseId, DomainResult, LessonId, ModuleId};

use crate::{Course, text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: ModuleId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDraft {
    pub title: String,
    pub description: Option<String>,
}

impl CourseModule {
    pub fn create(course: &Course, draft: ModuleDraft, position: i32, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: ModuleId::new(),
            company_id: course.company_id,
            course_id: course.id,
            title: text::required("Title", &draft.title)?,
            description: text::optional(draft.description),
            position,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub title: String,
}

impl Lesson {
    pub fn create(module: &CourseModule, draft: LessonDraft, position: i32, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: LessonId::new(),
            company_id: module.company_id,
            course_id: module.course_id,
            module_id: module.id,
            title: text::required("Title", &draft.title)?,
            position,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    Text,
    Video,
    File,
    Quiz,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "TEXT",
            BlockKind::Video => "VIDEO",
            BlockKind::File => "FILE",
            BlockKind::Quiz => "QUIZ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [BlockKind::Text, BlockKind::Video, BlockKind::File, BlockKind::Quiz]
            .into_iter()
            .find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBlock {
    pub id: BlockId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub kind: BlockKind,
    pub content: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDraft {
    pub kind: BlockKind,
    pub content: Option<String>,
}

impl LessonBlock {
    pub fn create(lesson: &Lesson, draft: BlockDraft, position: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: BlockId::new(),
            company_id: lesson.company_id,
            course_id: lesson.course_id,
            lesson_id: lesson.id,
            kind: draft.kind,
            content: text::optional(draft.content),
            position,
            created_at: now,
            updated_at: now,
        }
    }
}

scoped_entity!(CourseModule, ModuleId);
scoped_entity!(Lesson, LessonId);
scoped_entity!(LessonBlock, BlockId);
