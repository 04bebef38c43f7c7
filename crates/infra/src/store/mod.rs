//! Tenant-scoped persistence for the learning domain.
//!
//! One trait per area, combined into [`LearningStore`]. Every lookup takes the
//! caller's `CompanyId`; a row owned by another company is reported exactly
//! like a missing one. Operations that span several rows (course creation with
//! self-enrollment, chapter unpublish with course cascade, course publish with
//! legacy sync, bulk reorder, attempt admission, team course assignment) are
//! single store calls so each backend can make them atomic.

mod memory;
mod postgres;

pub use memory::InMemoryLearningStore;
pub use postgres::PostgresLearningStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use learnhub_auth::IdentityId;
use learnhub_core::{
    AttachmentId, AttemptId, BlockId, ChapterId, CompanyId, CourseId, DomainError, EnrollmentId, LessonId,
    ModuleId, ProfileId, QuestionId, QuizId, TeamCourseId, TeamId,
};
use learnhub_learning::{
    Attachment, AttemptAnswer, Badge, BlockDraft, CascadeOutcome, Chapter, ChapterDraft, ChapterPatch, Company,
    CompanyTeam, Course, CourseModule, Enrollment, Lesson, LessonBlock, LessonDraft, ModuleDraft, OptionDraft, PositionUpdate,
    QuestionDraft, Quiz, QuizAttempt, QuizDraft, QuizOption, QuizQuestion, TeamCourseAssignment, TeamMembership,
    TeamRole, UserProfile,
};

use crate::legacy_sync::LegacyChapterSync;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing, or owned by another company.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(DomainError),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        StoreError::Domain(value)
    }
}

impl From<learnhub_learning::AdmissionError> for StoreError {
    fn from(value: learnhub_learning::AdmissionError) -> Self {
        StoreError::Domain(value.into())
    }
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Onboarding: a new company together with its first HR admin.
    async fn create_company(&self, company: Company, admin: UserProfile) -> StoreResult<()>;

    async fn get_company(&self, company_id: CompanyId) -> StoreResult<Company>;

    /// Gate lookup by identity-provider subject. Not tenant scoped: the
    /// company is what this resolves.
    async fn find_profile_by_identity(&self, identity: &IdentityId) -> StoreResult<Option<UserProfile>>;

    async fn get_profile(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<UserProfile>;

    async fn list_profiles(&self, company_id: CompanyId) -> StoreResult<Vec<UserProfile>>;

    /// Fails with `Conflict` if the identity already has a profile.
    async fn insert_profile(&self, profile: UserProfile) -> StoreResult<()>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Inserts the course and the creator's enrollment together.
    async fn create_course(&self, course: Course, creator_enrollment: Enrollment) -> StoreResult<()>;

    async fn get_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Course>;

    /// Newest first.
    async fn list_courses(&self, company_id: CompanyId) -> StoreResult<Vec<Course>>;

    async fn save_course(&self, course: &Course) -> StoreResult<()>;

    /// Removes the course and everything hanging off it.
    async fn delete_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<()>;

    /// Sets the published flag and applies the legacy chapter sync.
    async fn publish_course(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        sync: &dyn LegacyChapterSync,
        now: DateTime<Utc>,
    ) -> StoreResult<Course>;

    async fn unpublish_course(&self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>)
    -> StoreResult<Course>;
}

#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Ordered by position.
    async fn list_chapters(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Chapter>>;

    async fn get_chapter(&self, company_id: CompanyId, course_id: CourseId, chapter_id: ChapterId)
    -> StoreResult<Chapter>;

    /// Creates the chapter at `max(position) + 1` within the course.
    async fn append_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ChapterDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter>;

    /// Applies a content patch in place. Publication state and position are
    /// left to their dedicated operations.
    async fn update_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        patch: ChapterPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter>;

    /// Fails with `Missing required fields` unless the stored chapter is
    /// content-complete.
    async fn publish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter>;

    /// Deleting a published chapter re-evaluates the course like an unpublish.
    async fn delete_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<CascadeOutcome>;

    /// Unpublishes the chapter, then unpublishes the course if no published
    /// chapter remains.
    async fn unpublish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Chapter, CascadeOutcome)>;

    /// Applies every `(id, position)` pair of the course; ids outside the
    /// course are skipped. Returns how many chapters changed.
    async fn reorder_chapters(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        updates: &[PositionUpdate<ChapterId>],
        now: DateTime<Utc>,
    ) -> StoreResult<usize>;
}

#[async_trait]
pub trait CurriculumStore: Send + Sync {
    async fn list_modules(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<CourseModule>>;

    async fn append_module(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ModuleDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<CourseModule>;

    async fn list_lessons(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Lesson>>;

    async fn append_lesson(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        module_id: ModuleId,
        draft: LessonDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Lesson>;

    async fn list_blocks(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<LessonBlock>>;

    async fn append_block(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        lesson_id: LessonId,
        draft: BlockDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonBlock>;

    async fn get_block(&self, company_id: CompanyId, course_id: CourseId, block_id: BlockId)
    -> StoreResult<LessonBlock>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Idempotent on (course, profile): returns the existing enrollment and
    /// `false` when there already is one.
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)>;

    async fn get_enrollment(&self, company_id: CompanyId, enrollment_id: EnrollmentId) -> StoreResult<Enrollment>;

    async fn list_course_enrollments(&self, company_id: CompanyId, course_id: CourseId)
    -> StoreResult<Vec<Enrollment>>;

    async fn list_profile_enrollments(
        &self,
        company_id: CompanyId,
        profile_id: ProfileId,
    ) -> StoreResult<Vec<Enrollment>>;

    async fn save_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn insert_team(&self, team: &CompanyTeam) -> StoreResult<()>;

    async fn get_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<CompanyTeam>;

    async fn list_teams(&self, company_id: CompanyId) -> StoreResult<Vec<CompanyTeam>>;

    async fn save_team(&self, team: &CompanyTeam) -> StoreResult<()>;

    /// Memberships and course assignments go with the team; enrollments stay.
    async fn delete_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<()>;

    /// Insert-or-update keyed by (team, profile).
    async fn upsert_member(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        profile_id: ProfileId,
        role: Option<TeamRole>,
        actor: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<TeamMembership>;

    async fn get_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId)
    -> StoreResult<TeamMembership>;

    async fn list_members(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<Vec<TeamMembership>>;

    async fn remove_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<()>;

    /// Records the assignment and enrolls every current member with source
    /// `TEAM`. Returns the assignment and the enrollments that were created.
    async fn assign_course(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        course_id: CourseId,
        assigned_by: ProfileId,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<(TeamCourseAssignment, Vec<Enrollment>)>;

    async fn get_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<TeamCourseAssignment>;

    async fn list_assignments(&self, company_id: CompanyId, team_id: TeamId)
    -> StoreResult<Vec<TeamCourseAssignment>>;

    /// Enrollments created by the assignment remain.
    async fn remove_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// The block must be a `QUIZ` block of the course without a quiz yet.
    async fn create_quiz(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        block_id: BlockId,
        draft: QuizDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Quiz>;

    async fn get_quiz(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Quiz>;

    async fn add_question(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        draft: QuestionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizQuestion>;

    async fn add_option(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        question_id: QuestionId,
        draft: OptionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizOption>;

    /// Ordered by position.
    async fn list_questions(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizQuestion>>;

    /// Ordered by question, then position.
    async fn list_options(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizOption>>;

    /// Computes the next attempt number and inserts the attempt as one step.
    async fn start_attempt(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        profile_id: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt>;

    async fn get_attempt(&self, company_id: CompanyId, quiz_id: QuizId, attempt_id: AttemptId)
    -> StoreResult<QuizAttempt>;

    /// Grades the attempt. Only its owner may submit; others see `NotFound`.
    async fn submit_attempt(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        profile_id: ProfileId,
        answers: Vec<AttemptAnswer>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt>;

    async fn list_attempts(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        profile_id: ProfileId,
    ) -> StoreResult<Vec<QuizAttempt>>;
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Chapter and block targets must belong to the attachment's course.
    async fn insert_attachment(&self, attachment: &Attachment) -> StoreResult<()>;

    async fn list_attachments(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Attachment>>;

    async fn delete_attachment(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        attachment_id: AttachmentId,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()>;

    /// The company's own badges plus the global ones.
    async fn list_badges(&self, company_id: CompanyId) -> StoreResult<Vec<Badge>>;
}

/// Every storage area the HTTP layer needs.
pub trait LearningStore:
    CompanyStore
    + CourseStore
    + ChapterStore
    + CurriculumStore
    + EnrollmentStore
    + TeamStore
    + QuizStore
    + AttachmentStore
    + BadgeStore
{
}

impl<T> LearningStore for T where
    T: CompanyStore
        + CourseStore
        + ChapterStore
        + CurriculumStore
        + EnrollmentStore
        + TeamStore
        + QuizStore
        + AttachmentStore
        + BadgeStore
{
}
