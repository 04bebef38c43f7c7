//! Request/response DTOs.
//!
//! Domain drafts (`CourseDraft`, `ChapterDraft`, ...) deserialize directly
//! from request bodies; the types here cover bodies that have no domain
//! counterpart and composite responses. JSON field names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{ChapterId, CourseId, OptionId, ProfileId};
use learnhub_learning::{
    AttemptAnswer, Chapter, Company, CourseModule, Lesson, LessonBlock, PositionUpdate, Quiz, QuizOption,
    QuizQuestion, TeamCourseAssignment, TeamRole, UserProfile,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub company_name: String,
    /// Defaults to the token's `name`, then `email`, then the subject.
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub company: Company,
    pub profile: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub profile: Option<UserProfile>,
    pub company: Option<Company>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterUnpublishedResponse {
    #[serde(flatten)]
    pub chapter: Chapter,
    /// `true` when this was the course's last published chapter.
    pub course_unpublished: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub list: Vec<PositionUpdate<ChapterId>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub profile_id: ProfileId,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

impl ProgressRequest {
    pub fn percent(&self) -> Option<u8> {
        u8::try_from(self.progress).ok().filter(|p| *p <= 100)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    pub profile_id: ProfileId,
    pub role: Option<TeamRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCourseRequest {
    pub course_id: CourseId,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCourseResponse {
    #[serde(flatten)]
    pub assignment: TeamCourseAssignment,
    /// Members enrolled by this assignment (already-enrolled members excluded).
    pub enrolled: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<AttemptAnswer>,
}

/// A module with its lessons and their blocks, in position order.
#[derive(Debug, Serialize)]
pub struct ModuleView {
    #[serde(flatten)]
    pub module: CourseModule,
    pub lessons: Vec<LessonView>,
}

#[derive(Debug, Serialize)]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub blocks: Vec<LessonBlock>,
}

pub fn curriculum_tree(modules: Vec<CourseModule>, lessons: Vec<Lesson>, blocks: Vec<LessonBlock>) -> Vec<ModuleView> {
    modules
        .into_iter()
        .map(|module| {
            let mut module_lessons: Vec<LessonView> = lessons
                .iter()
                .filter(|l| l.module_id == module.id)
                .map(|lesson| {
                    let mut lesson_blocks: Vec<LessonBlock> =
                        blocks.iter().filter(|b| b.lesson_id == lesson.id).cloned().collect();
                    lesson_blocks.sort_by_key(|b| b.position);
                    LessonView {
                        lesson: lesson.clone(),
                        blocks: lesson_blocks,
                    }
                })
                .collect();
            module_lessons.sort_by_key(|l| l.lesson.position);
            ModuleView {
                module,
                lessons: module_lessons,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct QuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// Answer keys are only revealed to `reveal_answers` callers (course editors).
pub fn quiz_view(quiz: Quiz, questions: Vec<QuizQuestion>, options: Vec<QuizOption>, reveal_answers: bool) -> QuizView {
    let questions = questions
        .into_iter()
        .map(|question| {
            let mut opts: Vec<&QuizOption> = options.iter().filter(|o| o.question_id == question.id).collect();
            opts.sort_by_key(|o| o.position);
            QuestionView {
                options: opts
                    .into_iter()
                    .map(|o| OptionView {
                        id: o.id,
                        text: o.text.clone(),
                        position: o.position,
                        is_correct: reveal_answers.then_some(o.is_correct),
                    })
                    .collect(),
                question,
            }
        })
        .collect();
    QuizView { quiz, questions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_outside_percent_range_is_rejected() {
        assert_eq!(ProgressRequest { progress: 40 }.percent(), Some(40));
        assert_eq!(ProgressRequest { progress: 100 }.percent(), Some(100));
        assert_eq!(ProgressRequest { progress: 101 }.percent(), None);
        assert_eq!(ProgressRequest { progress: -1 }.percent(), None);
    }

    #[test]
    fn reorder_body_uses_list_of_pairs() {
        let id = ChapterId::new();
        let body = serde_json::json!({ "list": [{ "id": id, "position": 3 }] });
        let req: ReorderRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.list, vec![PositionUpdate { id, position: 3 }]);
    }
}
