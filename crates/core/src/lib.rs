//! `learnhub-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, TenantScoped};
pub use error::{DomainError, DomainResult};
pub use id::{
    AttachmentId, AttemptId, BadgeId, BlockId, ChapterId, CompanyId, CourseId, EnrollmentId,
    LessonId, ModuleId, OptionId, ProfileId, QuestionId, QuizId, TeamCourseId, TeamId,
};
