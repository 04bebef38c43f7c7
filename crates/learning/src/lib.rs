//! Learning domain module.
//!
//! Business rules for courses, chapters, curriculum, enrollments, teams,
//! quizzes, attachments and badges, implemented as deterministic domain logic
//! (no IO, no HTTP, no storage). Every constructor takes the clock value
//! explicitly.

/// Implements `Entity` + `TenantScoped` for a struct with `id` and `company_id` fields.
macro_rules! scoped_entity {
    ($t:ty, $id:ty) => {
        impl learnhub_core::Entity for $t {
            type Id = $id;

            fn id(&self) -> &Self::Id {
                &self.id
            }
        }

        impl learnhub_core::TenantScoped for $t {
            fn company_id(&self) -> learnhub_core::CompanyId {
                self.company_id
            }
        }
    };
}

pub mod attachment;
pub mod badge;
pub mod chapter;
pub mod company;
pub mod course;
pub mod curriculum;
pub mod enrollment;
pub mod position;
pub mod publication;
pub mod quiz;
pub mod team;
mod text;

pub use attachment::{Attachment, AttachmentDraft, AttachmentTarget};
pub use badge::{Badge, BadgeDraft};
pub use chapter::{Chapter, ChapterDraft, ChapterPatch};
pub use company::{Company, ProfileDraft, UserProfile};
pub use course::{Course, CourseDraft, CoursePatch};
pub use curriculum::{BlockDraft, BlockKind, CourseModule, Lesson, LessonBlock, LessonDraft, ModuleDraft};
pub use enrollment::{Enrollment, EnrollmentSource, EnrollmentStatus};
pub use position::{PositionUpdate, ReorderPolicy, next_position};
pub use publication::{CascadeOutcome, cascade_after_unpublish};
pub use quiz::{
    AdmissionError, AttemptAnswer, AttemptStatus, OptionDraft, QuestionDraft, Quiz, QuizAttempt, QuizDraft,
    QuizOption, QuizQuestion, admit_attempt,
};
pub use team::{CompanyTeam, TeamCourseAssignment, TeamDraft, TeamMembership, TeamPatch, TeamRole};
