//! Postgres-backed store.
//!
//! ## Tenant Isolation
//!
//! Every query filters on `company_id`, so a row of another company is never
//! returned and is reported as `NotFound`.
//!
//! ## Atomicity
//!
//! Multi-row operations run in one transaction. Operations that derive a
//! value from existing rows (next position, next attempt number, remaining
//! published chapters) first lock the parent row with `FOR UPDATE`, so
//! concurrent requests on the same course or quiz are serialized.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Backend` |
//! | anything else | n/a | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use learnhub_auth::{IdentityId, Role};
use learnhub_core::{
    AttachmentId, AttemptId, BlockId, ChapterId, CompanyId, CourseId, EnrollmentId, LessonId, ModuleId, ProfileId,
    QuestionId, QuizId, TeamCourseId, TeamId,
};
use learnhub_learning::{
    Attachment, AttachmentTarget, AttemptAnswer, AttemptStatus, Badge, BlockDraft, BlockKind, CascadeOutcome,
    Chapter, ChapterDraft, ChapterPatch, Company, CompanyTeam, Course, CourseModule, Enrollment, EnrollmentSource,
    EnrollmentStatus, Lesson, LessonBlock, LessonDraft, ModuleDraft, OptionDraft, PositionUpdate, QuestionDraft,
    Quiz, QuizAttempt, QuizDraft, QuizOption, QuizQuestion, TeamCourseAssignment, TeamMembership, TeamRole,
    UserProfile, admit_attempt, cascade_after_unpublish, next_position,
};

use super::{
    AttachmentStore, BadgeStore, ChapterStore, CompanyStore, CourseStore, CurriculumStore, EnrollmentStore,
    QuizStore, StoreError, StoreResult, TeamStore,
};
use crate::legacy_sync::LegacyChapterSync;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const PROFILE_COLUMNS: &str = "id, company_id, identity_id, display_name, email, role, created_at";
const COURSE_COLUMNS: &str =
    "id, company_id, title, description, image_url, is_published, created_by, created_at, updated_at";
const CHAPTER_COLUMNS: &str = "id, company_id, course_id, title, description, video_url, content_url, position, \
                               is_published, source_module_id, created_at, updated_at";
const MODULE_COLUMNS: &str = "id, company_id, course_id, title, description, position, created_at, updated_at";
const LESSON_COLUMNS: &str = "id, company_id, course_id, module_id, title, position, created_at, updated_at";
const BLOCK_COLUMNS: &str = "id, company_id, course_id, lesson_id, kind, content, position, created_at, updated_at";
const ENROLLMENT_COLUMNS: &str = "id, company_id, course_id, profile_id, status, progress, source, assigned_by, \
                                  completed_at, created_at, updated_at";
const TEAM_COLUMNS: &str = "id, company_id, name, description, created_by, created_at, updated_at";
const MEMBER_COLUMNS: &str = "company_id, team_id, profile_id, role, added_by, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "id, company_id, team_id, course_id, assigned_by, due_at, created_at";
const QUIZ_COLUMNS: &str =
    "id, company_id, course_id, block_id, title, max_attempts, passing_score, created_at, updated_at";
const QUESTION_COLUMNS: &str = "id, company_id, quiz_id, prompt, position, created_at";
const OPTION_COLUMNS: &str = "id, company_id, quiz_id, question_id, text, is_correct, position, created_at";
const ATTEMPT_COLUMNS: &str = "id, company_id, quiz_id, profile_id, attempt_number, status, answers, score, passed, \
                               started_at, submitted_at";
const ATTACHMENT_COLUMNS: &str =
    "id, company_id, course_id, target_type, chapter_id, block_id, name, url, uploaded_by, created_at";
const BADGE_COLUMNS: &str = "id, company_id, name, description, image_url, created_by, created_at";

/// Postgres-backed learning store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PostgresLearningStore {
    pool: Arc<PgPool>,
}

impl PostgresLearningStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and apply the schema.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        let store = Self::new(pool);
        store.migrate().await.context("failed to apply schema")?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> StoreResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode_row", e))
}

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected {what} value in database: {value}"))
}

fn profile_from_row(row: &PgRow) -> StoreResult<UserProfile> {
    let role: String = col(row, "role")?;
    Ok(UserProfile {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        identity_id: IdentityId::new(col::<String>(row, "identity_id")?),
        display_name: col(row, "display_name")?,
        email: col(row, "email")?,
        role: role.parse::<Role>().map_err(|_| corrupt("role", &role))?,
        created_at: col(row, "created_at")?,
    })
}

fn course_from_row(row: &PgRow) -> StoreResult<Course> {
    Ok(Course {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        title: col(row, "title")?,
        description: col(row, "description")?,
        image_url: col(row, "image_url")?,
        is_published: col(row, "is_published")?,
        created_by: col::<Uuid>(row, "created_by")?.into(),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn chapter_from_row(row: &PgRow) -> StoreResult<Chapter> {
    Ok(Chapter {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        title: col(row, "title")?,
        description: col(row, "description")?,
        video_url: col(row, "video_url")?,
        content_url: col(row, "content_url")?,
        position: col(row, "position")?,
        is_published: col(row, "is_published")?,
        source_module_id: col::<Option<Uuid>>(row, "source_module_id")?.map(ModuleId::from),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn module_from_row(row: &PgRow) -> StoreResult<CourseModule> {
    Ok(CourseModule {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        title: col(row, "title")?,
        description: col(row, "description")?,
        position: col(row, "position")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn lesson_from_row(row: &PgRow) -> StoreResult<Lesson> {
    Ok(Lesson {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        module_id: col::<Uuid>(row, "module_id")?.into(),
        title: col(row, "title")?,
        position: col(row, "position")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn block_from_row(row: &PgRow) -> StoreResult<LessonBlock> {
    let kind: String = col(row, "kind")?;
    Ok(LessonBlock {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        lesson_id: col::<Uuid>(row, "lesson_id")?.into(),
        kind: BlockKind::parse(&kind).ok_or_else(|| corrupt("block kind", &kind))?,
        content: col(row, "content")?,
        position: col(row, "position")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> StoreResult<Enrollment> {
    let status: String = col(row, "status")?;
    let source: String = col(row, "source")?;
    let progress: i16 = col(row, "progress")?;
    Ok(Enrollment {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        profile_id: col::<Uuid>(row, "profile_id")?.into(),
        status: EnrollmentStatus::parse(&status).ok_or_else(|| corrupt("enrollment status", &status))?,
        progress: u8::try_from(progress).map_err(|_| corrupt("progress", &progress.to_string()))?,
        source: EnrollmentSource::parse(&source).ok_or_else(|| corrupt("enrollment source", &source))?,
        assigned_by: col::<Option<Uuid>>(row, "assigned_by")?.map(ProfileId::from),
        completed_at: col(row, "completed_at")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn team_from_row(row: &PgRow) -> StoreResult<CompanyTeam> {
    Ok(CompanyTeam {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        name: col(row, "name")?,
        description: col(row, "description")?,
        created_by: col::<Uuid>(row, "created_by")?.into(),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn member_from_row(row: &PgRow) -> StoreResult<TeamMembership> {
    let role: String = col(row, "role")?;
    Ok(TeamMembership {
        company_id: col::<Uuid>(row, "company_id")?.into(),
        team_id: col::<Uuid>(row, "team_id")?.into(),
        profile_id: col::<Uuid>(row, "profile_id")?.into(),
        role: TeamRole::parse(&role).ok_or_else(|| corrupt("team role", &role))?,
        added_by: col::<Uuid>(row, "added_by")?.into(),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn assignment_from_row(row: &PgRow) -> StoreResult<TeamCourseAssignment> {
    Ok(TeamCourseAssignment {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        team_id: col::<Uuid>(row, "team_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        assigned_by: col::<Uuid>(row, "assigned_by")?.into(),
        due_at: col(row, "due_at")?,
        created_at: col(row, "created_at")?,
    })
}

fn quiz_from_row(row: &PgRow) -> StoreResult<Quiz> {
    let max_attempts: Option<i32> = col(row, "max_attempts")?;
    let passing_score: i16 = col(row, "passing_score")?;
    Ok(Quiz {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        block_id: col::<Uuid>(row, "block_id")?.into(),
        title: col(row, "title")?,
        max_attempts: max_attempts
            .map(|m| u32::try_from(m).map_err(|_| corrupt("max_attempts", &m.to_string())))
            .transpose()?,
        passing_score: u8::try_from(passing_score).map_err(|_| corrupt("passing_score", &passing_score.to_string()))?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn question_from_row(row: &PgRow) -> StoreResult<QuizQuestion> {
    Ok(QuizQuestion {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        quiz_id: col::<Uuid>(row, "quiz_id")?.into(),
        prompt: col(row, "prompt")?,
        position: col(row, "position")?,
        created_at: col(row, "created_at")?,
    })
}

fn option_from_row(row: &PgRow) -> StoreResult<QuizOption> {
    Ok(QuizOption {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        quiz_id: col::<Uuid>(row, "quiz_id")?.into(),
        question_id: col::<Uuid>(row, "question_id")?.into(),
        text: col(row, "text")?,
        is_correct: col(row, "is_correct")?,
        position: col(row, "position")?,
        created_at: col(row, "created_at")?,
    })
}

fn attempt_from_row(row: &PgRow) -> StoreResult<QuizAttempt> {
    let status: String = col(row, "status")?;
    let number: i32 = col(row, "attempt_number")?;
    let answers: serde_json::Value = col(row, "answers")?;
    let score: Option<i16> = col(row, "score")?;
    Ok(QuizAttempt {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        quiz_id: col::<Uuid>(row, "quiz_id")?.into(),
        profile_id: col::<Uuid>(row, "profile_id")?.into(),
        attempt_number: u32::try_from(number).map_err(|_| corrupt("attempt_number", &number.to_string()))?,
        status: AttemptStatus::parse(&status).ok_or_else(|| corrupt("attempt status", &status))?,
        answers: serde_json::from_value::<Vec<AttemptAnswer>>(answers)
            .map_err(|e| corrupt("attempt answers", &e.to_string()))?,
        score: score
            .map(|s| u8::try_from(s).map_err(|_| corrupt("score", &s.to_string())))
            .transpose()?,
        passed: col(row, "passed")?,
        started_at: col(row, "started_at")?,
        submitted_at: col(row, "submitted_at")?,
    })
}

fn attachment_from_row(row: &PgRow) -> StoreResult<Attachment> {
    let target_type: String = col(row, "target_type")?;
    let chapter_id: Option<Uuid> = col(row, "chapter_id")?;
    let block_id: Option<Uuid> = col(row, "block_id")?;
    let target = match (target_type.as_str(), chapter_id, block_id) {
        ("COURSE", _, _) => AttachmentTarget::Course,
        ("CHAPTER", Some(id), _) => AttachmentTarget::Chapter(ChapterId::from(id)),
        ("BLOCK", _, Some(id)) => AttachmentTarget::Block(BlockId::from(id)),
        _ => return Err(corrupt("attachment target", &target_type)),
    };
    Ok(Attachment {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Uuid>(row, "company_id")?.into(),
        course_id: col::<Uuid>(row, "course_id")?.into(),
        target,
        name: col(row, "name")?,
        url: col(row, "url")?,
        uploaded_by: col::<Uuid>(row, "uploaded_by")?.into(),
        created_at: col(row, "created_at")?,
    })
}

fn badge_from_row(row: &PgRow) -> StoreResult<Badge> {
    Ok(Badge {
        id: col::<Uuid>(row, "id")?.into(),
        company_id: col::<Option<Uuid>>(row, "company_id")?.map(CompanyId::from),
        name: col(row, "name")?,
        description: col(row, "description")?,
        image_url: col(row, "image_url")?,
        created_by: col::<Option<Uuid>>(row, "created_by")?.map(ProfileId::from),
        created_at: col(row, "created_at")?,
    })
}

fn rows<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

/// Fetch the course, optionally locking its row for the rest of the transaction.
async fn fetch_course<'e, E>(exec: E, company_id: CompanyId, course_id: CourseId, lock: bool) -> StoreResult<Course>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE company_id = $1 AND id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(course_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_course", e))?
        .ok_or(StoreError::NotFound("Course"))?;
    course_from_row(&row)
}

async fn fetch_chapter<'e, E>(
    exec: E,
    company_id: CompanyId,
    course_id: CourseId,
    chapter_id: ChapterId,
    lock: bool,
) -> StoreResult<Chapter>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE company_id = $1 AND course_id = $2 AND id = $3{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(course_id))
        .bind(Uuid::from(chapter_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_chapter", e))?
        .ok_or(StoreError::NotFound("Chapter"))?;
    chapter_from_row(&row)
}

async fn fetch_profile<'e, E>(exec: E, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<UserProfile>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE company_id = $1 AND id = $2");
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(profile_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_profile", e))?
        .ok_or(StoreError::NotFound("Profile"))?;
    profile_from_row(&row)
}

async fn fetch_team<'e, E>(exec: E, company_id: CompanyId, team_id: TeamId) -> StoreResult<CompanyTeam>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE company_id = $1 AND id = $2");
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(team_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_team", e))?
        .ok_or(StoreError::NotFound("Team"))?;
    team_from_row(&row)
}

async fn fetch_quiz<'e, E>(exec: E, company_id: CompanyId, quiz_id: QuizId, lock: bool) -> StoreResult<Quiz>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE company_id = $1 AND id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(quiz_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_quiz", e))?
        .ok_or(StoreError::NotFound("Quiz"))?;
    quiz_from_row(&row)
}

async fn fetch_block<'e, E>(exec: E, company_id: CompanyId, course_id: CourseId, block_id: BlockId) -> StoreResult<LessonBlock>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM lesson_blocks WHERE company_id = $1 AND course_id = $2 AND id = $3");
    let row = sqlx::query(&sql)
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(course_id))
        .bind(Uuid::from(block_id))
        .fetch_optional(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_block", e))?
        .ok_or(StoreError::NotFound("Block"))?;
    block_from_row(&row)
}

async fn positions<'e, E>(exec: E, sql: &str, parent: Uuid) -> StoreResult<Vec<i32>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows = sqlx::query(sql)
        .bind(parent)
        .fetch_all(exec)
        .await
        .map_err(|e| map_sqlx_error("fetch_positions", e))?;
    rows.iter().map(|r| col::<i32>(r, "position")).collect()
}

async fn upsert_chapter<'e, E>(exec: E, chapter: &Chapter) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO chapters (
            id, company_id, course_id, title, description, video_url, content_url,
            position, is_published, source_module_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            video_url = EXCLUDED.video_url,
            content_url = EXCLUDED.content_url,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(Uuid::from(chapter.id))
    .bind(Uuid::from(chapter.company_id))
    .bind(Uuid::from(chapter.course_id))
    .bind(&chapter.title)
    .bind(&chapter.description)
    .bind(&chapter.video_url)
    .bind(&chapter.content_url)
    .bind(chapter.position)
    .bind(chapter.is_published)
    .bind(chapter.source_module_id.map(Uuid::from))
    .bind(chapter.created_at)
    .bind(chapter.updated_at)
    .execute(exec)
    .await
    .map_err(|e| map_sqlx_error("upsert_chapter", e))?;
    Ok(())
}

/// Publication state is only written here, by publish and unpublish.
async fn update_chapter_publication<'e, E>(exec: E, chapter: &Chapter) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query("UPDATE chapters SET is_published = $1, updated_at = $2 WHERE id = $3")
        .bind(chapter.is_published)
        .bind(chapter.updated_at)
        .bind(Uuid::from(chapter.id))
        .execute(exec)
        .await
        .map_err(|e| map_sqlx_error("update_chapter_publication", e))?;
    Ok(())
}

async fn update_course_row<'e, E>(exec: E, course: &Course) -> StoreResult<u64>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE courses
        SET title = $3, description = $4, image_url = $5, is_published = $6, updated_at = $7
        WHERE company_id = $1 AND id = $2
        "#,
    )
    .bind(Uuid::from(course.company_id))
    .bind(Uuid::from(course.id))
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.image_url)
    .bind(course.is_published)
    .bind(course.updated_at)
    .execute(exec)
    .await
    .map_err(|e| map_sqlx_error("update_course", e))?;
    Ok(result.rows_affected())
}

async fn count_published_chapters<'e, E>(exec: E, course_id: CourseId) -> StoreResult<usize>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query("SELECT COUNT(*) AS n FROM chapters WHERE course_id = $1 AND is_published")
        .bind(Uuid::from(course_id))
        .fetch_one(exec)
        .await
        .map_err(|e| map_sqlx_error("count_published_chapters", e))?;
    let n: i64 = col(&row, "n")?;
    Ok(usize::try_from(n).unwrap_or_default())
}

/// Insert unless (course, profile) is already enrolled; returns whichever row wins.
async fn insert_enrollment(tx: &mut Transaction<'static, Postgres>, enrollment: &Enrollment) -> StoreResult<(Enrollment, bool)> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO enrollments (
            id, company_id, course_id, profile_id, status, progress, source,
            assigned_by, completed_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (course_id, profile_id) DO NOTHING
        "#,
    )
    .bind(Uuid::from(enrollment.id))
    .bind(Uuid::from(enrollment.company_id))
    .bind(Uuid::from(enrollment.course_id))
    .bind(Uuid::from(enrollment.profile_id))
    .bind(enrollment.status.as_str())
    .bind(i16::from(enrollment.progress))
    .bind(enrollment.source.as_str())
    .bind(enrollment.assigned_by.map(Uuid::from))
    .bind(enrollment.completed_at)
    .bind(enrollment.created_at)
    .bind(enrollment.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_enrollment", e))?
    .rows_affected()
        == 1;

    if inserted {
        return Ok((enrollment.clone(), true));
    }

    let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 AND profile_id = $2");
    let row = sqlx::query(&sql)
        .bind(Uuid::from(enrollment.course_id))
        .bind(Uuid::from(enrollment.profile_id))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_enrollment", e))?;
    Ok((enrollment_from_row(&row)?, false))
}

#[async_trait]
impl CompanyStore for PostgresLearningStore {
    #[instrument(skip(self, company, admin), fields(company_id = %company.id), err)]
    async fn create_company(&self, company: Company, admin: UserProfile) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("INSERT INTO companies (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(Uuid::from(company.id))
            .bind(&company.name)
            .bind(company.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_company", e))?;
        insert_profile_row(&mut tx, &admin).await?;
        commit(tx).await
    }

    async fn get_company(&self, company_id: CompanyId) -> StoreResult<Company> {
        let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE id = $1")
            .bind(Uuid::from(company_id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_company", e))?
            .ok_or(StoreError::NotFound("Company"))?;
        Ok(Company {
            id: col::<Uuid>(&row, "id")?.into(),
            name: col(&row, "name")?,
            created_at: col(&row, "created_at")?,
        })
    }

    async fn find_profile_by_identity(&self, identity: &IdentityId) -> StoreResult<Option<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE identity_id = $1");
        let row = sqlx::query(&sql)
            .bind(identity.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_profile_by_identity", e))?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn get_profile(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<UserProfile> {
        fetch_profile(&*self.pool, company_id, profile_id).await
    }

    async fn list_profiles(&self, company_id: CompanyId) -> StoreResult<Vec<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE company_id = $1 ORDER BY created_at, id");
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_profiles", e))?;
        rows(found, profile_from_row)
    }

    async fn insert_profile(&self, profile: UserProfile) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        insert_profile_row(&mut tx, &profile).await?;
        commit(tx).await
    }
}

async fn insert_profile_row(tx: &mut Transaction<'static, Postgres>, profile: &UserProfile) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, company_id, identity_id, display_name, email, role, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::from(profile.id))
    .bind(Uuid::from(profile.company_id))
    .bind(profile.identity_id.as_str())
    .bind(&profile.display_name)
    .bind(&profile.email)
    .bind(profile.role.as_str())
    .bind(profile.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match map_sqlx_error("insert_profile", e) {
        StoreError::Conflict(_) => StoreError::Conflict("Identity already has a profile".into()),
        other => other,
    })?;
    Ok(())
}

#[async_trait]
impl CourseStore for PostgresLearningStore {
    #[instrument(skip(self, course, creator_enrollment), fields(course_id = %course.id), err)]
    async fn create_course(&self, course: Course, creator_enrollment: Enrollment) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        fetch_profile(&mut *tx, course.company_id, course.created_by).await?;
        sqlx::query(
            r#"
            INSERT INTO courses (
                id, company_id, title, description, image_url, is_published, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(course.id))
        .bind(Uuid::from(course.company_id))
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.image_url)
        .bind(course.is_published)
        .bind(Uuid::from(course.created_by))
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_course", e))?;
        insert_enrollment(&mut tx, &creator_enrollment).await?;
        commit(tx).await
    }

    async fn get_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Course> {
        fetch_course(&*self.pool, company_id, course_id, false).await
    }

    async fn list_courses(&self, company_id: CompanyId) -> StoreResult<Vec<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE company_id = $1 ORDER BY created_at DESC, id DESC");
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_courses", e))?;
        rows(found, course_from_row)
    }

    async fn save_course(&self, course: &Course) -> StoreResult<()> {
        match update_course_row(&*self.pool, course).await? {
            0 => Err(StoreError::NotFound("Course")),
            _ => Ok(()),
        }
    }

    async fn delete_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM courses WHERE company_id = $1 AND id = $2")
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_course", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Course")),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, sync), fields(company_id = %company_id, course_id = %course_id), err)]
    async fn publish_course(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        sync: &dyn LegacyChapterSync,
        now: DateTime<Utc>,
    ) -> StoreResult<Course> {
        let mut tx = self.begin().await?;
        let mut course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        course.publish(now);

        let module_sql = format!("SELECT {MODULE_COLUMNS} FROM course_modules WHERE course_id = $1 ORDER BY position");
        let modules = rows(
            sqlx::query(&module_sql)
                .bind(Uuid::from(course_id))
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("list_modules", e))?,
            module_from_row,
        )?;
        let chapter_sql = format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE course_id = $1 ORDER BY position");
        let chapters = rows(
            sqlx::query(&chapter_sql)
                .bind(Uuid::from(course_id))
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("list_chapters", e))?,
            chapter_from_row,
        )?;

        for chapter in sync.plan(&course, &modules, &chapters, now)? {
            upsert_chapter(&mut *tx, &chapter).await?;
        }
        update_course_row(&mut *tx, &course).await?;
        commit(tx).await?;
        Ok(course)
    }

    async fn unpublish_course(&self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>) -> StoreResult<Course> {
        let mut tx = self.begin().await?;
        let mut course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        course.unpublish(now);
        update_course_row(&mut *tx, &course).await?;
        commit(tx).await?;
        Ok(course)
    }
}

#[async_trait]
impl ChapterStore for PostgresLearningStore {
    async fn list_chapters(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Chapter>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE company_id = $1 AND course_id = $2 \
             ORDER BY position, created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_chapters", e))?;
        rows(found, chapter_from_row)
    }

    async fn get_chapter(&self, company_id: CompanyId, course_id: CourseId, chapter_id: ChapterId) -> StoreResult<Chapter> {
        fetch_chapter(&*self.pool, company_id, course_id, chapter_id, false).await
    }

    async fn append_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ChapterDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let mut tx = self.begin().await?;
        let course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        let existing = positions(&mut *tx, "SELECT position FROM chapters WHERE course_id = $1", Uuid::from(course_id)).await?;
        let chapter = Chapter::create(&course, draft, next_position(existing), now)?;
        upsert_chapter(&mut *tx, &chapter).await?;
        commit(tx).await?;
        Ok(chapter)
    }

    async fn update_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        patch: ChapterPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let mut tx = self.begin().await?;
        let mut chapter = fetch_chapter(&mut *tx, company_id, course_id, chapter_id, true).await?;
        chapter.apply_patch(patch, now)?;
        upsert_chapter(&mut *tx, &chapter).await?;
        commit(tx).await?;
        Ok(chapter)
    }

    #[instrument(skip(self), err)]
    async fn publish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let mut tx = self.begin().await?;
        fetch_course(&mut *tx, company_id, course_id, true).await?;
        let mut chapter = fetch_chapter(&mut *tx, company_id, course_id, chapter_id, true).await?;
        chapter.publish(now)?;
        update_chapter_publication(&mut *tx, &chapter).await?;
        commit(tx).await?;
        Ok(chapter)
    }

    #[instrument(skip(self), err)]
    async fn delete_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<CascadeOutcome> {
        let mut tx = self.begin().await?;
        let mut course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        let chapter = fetch_chapter(&mut *tx, company_id, course_id, chapter_id, true).await?;
        sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(Uuid::from(chapter_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_chapter", e))?;

        let mut outcome = CascadeOutcome::CourseUntouched;
        if chapter.is_published {
            let remaining = count_published_chapters(&mut *tx, course_id).await?;
            outcome = cascade_after_unpublish(&mut course, remaining, now);
            if outcome == CascadeOutcome::CourseUnpublished {
                update_course_row(&mut *tx, &course).await?;
            }
        }
        commit(tx).await?;
        Ok(outcome)
    }

    #[instrument(skip(self), err)]
    async fn unpublish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Chapter, CascadeOutcome)> {
        let mut tx = self.begin().await?;
        let mut course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        let mut chapter = fetch_chapter(&mut *tx, company_id, course_id, chapter_id, true).await?;
        chapter.unpublish(now);
        update_chapter_publication(&mut *tx, &chapter).await?;

        let remaining = count_published_chapters(&mut *tx, course_id).await?;
        let outcome = cascade_after_unpublish(&mut course, remaining, now);
        if outcome == CascadeOutcome::CourseUnpublished {
            update_course_row(&mut *tx, &course).await?;
        }
        commit(tx).await?;
        Ok((chapter, outcome))
    }

    async fn reorder_chapters(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        updates: &[PositionUpdate<ChapterId>],
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut tx = self.begin().await?;
        fetch_course(&mut *tx, company_id, course_id, true).await?;
        let mut changed = 0u64;
        for update in updates {
            changed += sqlx::query(
                r#"
                UPDATE chapters SET position = $1, updated_at = $2
                WHERE company_id = $3 AND course_id = $4 AND id = $5
                "#,
            )
            .bind(update.position)
            .bind(now)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .bind(Uuid::from(update.id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("reorder_chapters", e))?
            .rows_affected();
        }
        commit(tx).await?;
        Ok(usize::try_from(changed).unwrap_or(usize::MAX))
    }
}

#[async_trait]
impl CurriculumStore for PostgresLearningStore {
    async fn list_modules(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<CourseModule>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {MODULE_COLUMNS} FROM course_modules WHERE company_id = $1 AND course_id = $2 ORDER BY position, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_modules", e))?;
        rows(found, module_from_row)
    }

    async fn append_module(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ModuleDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<CourseModule> {
        let mut tx = self.begin().await?;
        let course = fetch_course(&mut *tx, company_id, course_id, true).await?;
        let existing = positions(&mut *tx, "SELECT position FROM course_modules WHERE course_id = $1", Uuid::from(course_id)).await?;
        let module = CourseModule::create(&course, draft, next_position(existing), now)?;
        sqlx::query(
            r#"
            INSERT INTO course_modules (id, company_id, course_id, title, description, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(module.id))
        .bind(Uuid::from(module.company_id))
        .bind(Uuid::from(module.course_id))
        .bind(&module.title)
        .bind(&module.description)
        .bind(module.position)
        .bind(module.created_at)
        .bind(module.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_module", e))?;
        commit(tx).await?;
        Ok(module)
    }

    async fn list_lessons(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Lesson>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE company_id = $1 AND course_id = $2 ORDER BY module_id, position, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_lessons", e))?;
        rows(found, lesson_from_row)
    }

    async fn append_lesson(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        module_id: ModuleId,
        draft: LessonDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Lesson> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "SELECT {MODULE_COLUMNS} FROM course_modules WHERE company_id = $1 AND course_id = $2 AND id = $3 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .bind(Uuid::from(module_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_module", e))?
            .ok_or(StoreError::NotFound("Module"))?;
        let module = module_from_row(&row)?;
        let existing = positions(&mut *tx, "SELECT position FROM lessons WHERE module_id = $1", Uuid::from(module_id)).await?;
        let lesson = Lesson::create(&module, draft, next_position(existing), now)?;
        sqlx::query(
            r#"
            INSERT INTO lessons (id, company_id, course_id, module_id, title, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(lesson.id))
        .bind(Uuid::from(lesson.company_id))
        .bind(Uuid::from(lesson.course_id))
        .bind(Uuid::from(lesson.module_id))
        .bind(&lesson.title)
        .bind(lesson.position)
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_lesson", e))?;
        commit(tx).await?;
        Ok(lesson)
    }

    async fn list_blocks(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<LessonBlock>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM lesson_blocks WHERE company_id = $1 AND course_id = $2 \
             ORDER BY lesson_id, position, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_blocks", e))?;
        rows(found, block_from_row)
    }

    async fn append_block(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        lesson_id: LessonId,
        draft: BlockDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonBlock> {
        let mut tx = self.begin().await?;
        let sql =
            format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE company_id = $1 AND course_id = $2 AND id = $3 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .bind(Uuid::from(lesson_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_lesson", e))?
            .ok_or(StoreError::NotFound("Lesson"))?;
        let lesson = lesson_from_row(&row)?;
        let existing = positions(&mut *tx, "SELECT position FROM lesson_blocks WHERE lesson_id = $1", Uuid::from(lesson_id)).await?;
        let block = LessonBlock::create(&lesson, draft, next_position(existing), now);
        sqlx::query(
            r#"
            INSERT INTO lesson_blocks (id, company_id, course_id, lesson_id, kind, content, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(block.id))
        .bind(Uuid::from(block.company_id))
        .bind(Uuid::from(block.course_id))
        .bind(Uuid::from(block.lesson_id))
        .bind(block.kind.as_str())
        .bind(&block.content)
        .bind(block.position)
        .bind(block.created_at)
        .bind(block.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_block", e))?;
        commit(tx).await?;
        Ok(block)
    }

    async fn get_block(&self, company_id: CompanyId, course_id: CourseId, block_id: BlockId) -> StoreResult<LessonBlock> {
        fetch_block(&*self.pool, company_id, course_id, block_id).await
    }
}

#[async_trait]
impl EnrollmentStore for PostgresLearningStore {
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)> {
        let mut tx = self.begin().await?;
        fetch_course(&mut *tx, enrollment.company_id, enrollment.course_id, false).await?;
        fetch_profile(&mut *tx, enrollment.company_id, enrollment.profile_id).await?;
        let result = insert_enrollment(&mut tx, &enrollment).await?;
        commit(tx).await?;
        Ok(result)
    }

    async fn get_enrollment(&self, company_id: CompanyId, enrollment_id: EnrollmentId) -> StoreResult<Enrollment> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE company_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(enrollment_id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_enrollment", e))?
            .ok_or(StoreError::NotFound("Enrollment"))?;
        enrollment_from_row(&row)
    }

    async fn list_course_enrollments(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Enrollment>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE company_id = $1 AND course_id = $2 ORDER BY created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_course_enrollments", e))?;
        rows(found, enrollment_from_row)
    }

    async fn list_profile_enrollments(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE company_id = $1 AND profile_id = $2 ORDER BY created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(profile_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_profile_enrollments", e))?;
        rows(found, enrollment_from_row)
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = $3, progress = $4, completed_at = $5, updated_at = $6
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(Uuid::from(enrollment.company_id))
        .bind(Uuid::from(enrollment.id))
        .bind(enrollment.status.as_str())
        .bind(i16::from(enrollment.progress))
        .bind(enrollment.completed_at)
        .bind(enrollment.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_enrollment", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Enrollment")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TeamStore for PostgresLearningStore {
    async fn insert_team(&self, team: &CompanyTeam) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, company_id, name, description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(team.id))
        .bind(Uuid::from(team.company_id))
        .bind(&team.name)
        .bind(&team.description)
        .bind(Uuid::from(team.created_by))
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_team", e))?;
        Ok(())
    }

    async fn get_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<CompanyTeam> {
        fetch_team(&*self.pool, company_id, team_id).await
    }

    async fn list_teams(&self, company_id: CompanyId) -> StoreResult<Vec<CompanyTeam>> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE company_id = $1 ORDER BY lower(name), id");
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_teams", e))?;
        rows(found, team_from_row)
    }

    async fn save_team(&self, team: &CompanyTeam) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE teams SET name = $3, description = $4, updated_at = $5 WHERE company_id = $1 AND id = $2",
        )
        .bind(Uuid::from(team.company_id))
        .bind(Uuid::from(team.id))
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_team", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Team")),
            _ => Ok(()),
        }
    }

    async fn delete_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM teams WHERE company_id = $1 AND id = $2")
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_team", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Team")),
            _ => Ok(()),
        }
    }

    async fn upsert_member(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        profile_id: ProfileId,
        role: Option<TeamRole>,
        actor: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<TeamMembership> {
        let mut tx = self.begin().await?;
        let team = fetch_team(&mut *tx, company_id, team_id).await?;
        fetch_profile(&mut *tx, company_id, profile_id).await?;

        let sql = format!("SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = $1 AND profile_id = $2 FOR UPDATE");
        let existing = sqlx::query(&sql)
            .bind(Uuid::from(team_id))
            .bind(Uuid::from(profile_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_member", e))?
            .as_ref()
            .map(member_from_row)
            .transpose()?;

        let membership = TeamMembership::upsert(existing, &team, profile_id, role, actor, now);
        sqlx::query(
            r#"
            INSERT INTO team_members (company_id, team_id, profile_id, role, added_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (team_id, profile_id) DO UPDATE SET
                role = EXCLUDED.role,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::from(membership.company_id))
        .bind(Uuid::from(membership.team_id))
        .bind(Uuid::from(membership.profile_id))
        .bind(membership.role.as_str())
        .bind(Uuid::from(membership.added_by))
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_member", e))?;
        commit(tx).await?;
        Ok(membership)
    }

    async fn get_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<TeamMembership> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE company_id = $1 AND team_id = $2 AND profile_id = $3"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .bind(Uuid::from(profile_id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_member", e))?
            .ok_or(StoreError::NotFound("Member"))?;
        member_from_row(&row)
    }

    async fn list_members(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<Vec<TeamMembership>> {
        fetch_team(&*self.pool, company_id, team_id).await?;
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE company_id = $1 AND team_id = $2 ORDER BY created_at, profile_id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_members", e))?;
        rows(found, member_from_row)
    }

    async fn remove_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM team_members WHERE company_id = $1 AND team_id = $2 AND profile_id = $3")
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .bind(Uuid::from(profile_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_member", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Member")),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self), err)]
    async fn assign_course(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        course_id: CourseId,
        assigned_by: ProfileId,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<(TeamCourseAssignment, Vec<Enrollment>)> {
        let mut tx = self.begin().await?;
        let team = fetch_team(&mut *tx, company_id, team_id).await?;
        fetch_course(&mut *tx, company_id, course_id, false).await?;

        let assignment = TeamCourseAssignment::new(&team, course_id, assigned_by, due_at, now);
        sqlx::query(
            r#"
            INSERT INTO team_courses (id, company_id, team_id, course_id, assigned_by, due_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(assignment.id))
        .bind(Uuid::from(assignment.company_id))
        .bind(Uuid::from(assignment.team_id))
        .bind(Uuid::from(assignment.course_id))
        .bind(Uuid::from(assignment.assigned_by))
        .bind(assignment.due_at)
        .bind(assignment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error("insert_team_course", e) {
            StoreError::Conflict(_) => StoreError::Conflict("Course already assigned to team".into()),
            other => other,
        })?;

        let member_rows = sqlx::query("SELECT profile_id FROM team_members WHERE team_id = $1")
            .bind(Uuid::from(team_id))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("list_members", e))?;

        let mut created = Vec::new();
        for row in &member_rows {
            let profile_id = ProfileId::from(col::<Uuid>(row, "profile_id")?);
            let enrollment = Enrollment::new(
                company_id,
                course_id,
                profile_id,
                EnrollmentSource::Team,
                Some(assigned_by),
                now,
            );
            let (enrollment, inserted) = insert_enrollment(&mut tx, &enrollment).await?;
            if inserted {
                created.push(enrollment);
            }
        }
        commit(tx).await?;
        Ok((assignment, created))
    }

    async fn get_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<TeamCourseAssignment> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM team_courses WHERE company_id = $1 AND team_id = $2 AND id = $3");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .bind(Uuid::from(assignment_id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_assignment", e))?
            .ok_or(StoreError::NotFound("Assignment"))?;
        assignment_from_row(&row)
    }

    async fn list_assignments(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<Vec<TeamCourseAssignment>> {
        fetch_team(&*self.pool, company_id, team_id).await?;
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM team_courses WHERE company_id = $1 AND team_id = $2 ORDER BY created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_assignments", e))?;
        rows(found, assignment_from_row)
    }

    async fn remove_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM team_courses WHERE company_id = $1 AND team_id = $2 AND id = $3")
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(team_id))
            .bind(Uuid::from(assignment_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_assignment", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Assignment")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl QuizStore for PostgresLearningStore {
    async fn create_quiz(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        block_id: BlockId,
        draft: QuizDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Quiz> {
        let block = fetch_block(&*self.pool, company_id, course_id, block_id).await?;
        let quiz = Quiz::create(&block, draft, now)?;
        sqlx::query(
            r#"
            INSERT INTO quizzes (
                id, company_id, course_id, block_id, title, max_attempts, passing_score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(quiz.id))
        .bind(Uuid::from(quiz.company_id))
        .bind(Uuid::from(quiz.course_id))
        .bind(Uuid::from(quiz.block_id))
        .bind(&quiz.title)
        .bind(quiz.max_attempts.map(|m| i32::try_from(m).unwrap_or(i32::MAX)))
        .bind(i16::from(quiz.passing_score))
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_quiz", e) {
            StoreError::Conflict(_) => StoreError::Conflict("Block already has a quiz".into()),
            other => other,
        })?;
        Ok(quiz)
    }

    async fn get_quiz(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Quiz> {
        fetch_quiz(&*self.pool, company_id, quiz_id, false).await
    }

    async fn add_question(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        draft: QuestionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizQuestion> {
        let mut tx = self.begin().await?;
        let quiz = fetch_quiz(&mut *tx, company_id, quiz_id, true).await?;
        let existing = positions(&mut *tx, "SELECT position FROM quiz_questions WHERE quiz_id = $1", Uuid::from(quiz_id)).await?;
        let question = QuizQuestion::create(&quiz, draft, next_position(existing), now)?;
        sqlx::query(
            r#"
            INSERT INTO quiz_questions (id, company_id, quiz_id, prompt, position, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(question.id))
        .bind(Uuid::from(question.company_id))
        .bind(Uuid::from(question.quiz_id))
        .bind(&question.prompt)
        .bind(question.position)
        .bind(question.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_question", e))?;
        commit(tx).await?;
        Ok(question)
    }

    async fn add_option(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        question_id: QuestionId,
        draft: OptionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizOption> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE company_id = $1 AND quiz_id = $2 AND id = $3 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(quiz_id))
            .bind(Uuid::from(question_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_question", e))?
            .ok_or(StoreError::NotFound("Question"))?;
        let question = question_from_row(&row)?;
        let existing = positions(&mut *tx, "SELECT position FROM quiz_options WHERE question_id = $1", Uuid::from(question_id)).await?;
        let option = QuizOption::create(&question, draft, next_position(existing), now)?;
        sqlx::query(
            r#"
            INSERT INTO quiz_options (id, company_id, quiz_id, question_id, text, is_correct, position, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(option.id))
        .bind(Uuid::from(option.company_id))
        .bind(Uuid::from(option.quiz_id))
        .bind(Uuid::from(option.question_id))
        .bind(&option.text)
        .bind(option.is_correct)
        .bind(option.position)
        .bind(option.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_option", e))?;
        commit(tx).await?;
        Ok(option)
    }

    async fn list_questions(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizQuestion>> {
        fetch_quiz(&*self.pool, company_id, quiz_id, false).await?;
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY position, id");
        let found = sqlx::query(&sql)
            .bind(Uuid::from(quiz_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_questions", e))?;
        rows(found, question_from_row)
    }

    async fn list_options(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizOption>> {
        fetch_quiz(&*self.pool, company_id, quiz_id, false).await?;
        let sql = format!("SELECT {OPTION_COLUMNS} FROM quiz_options WHERE quiz_id = $1 ORDER BY question_id, position, id");
        let found = sqlx::query(&sql)
            .bind(Uuid::from(quiz_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_options", e))?;
        rows(found, option_from_row)
    }

    #[instrument(skip(self), err)]
    async fn start_attempt(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        profile_id: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        let mut tx = self.begin().await?;
        // The quiz row lock serializes admissions for this quiz.
        let quiz = fetch_quiz(&mut *tx, company_id, quiz_id, true).await?;
        let held_rows = sqlx::query("SELECT attempt_number FROM quiz_attempts WHERE quiz_id = $1 AND profile_id = $2")
            .bind(Uuid::from(quiz_id))
            .bind(Uuid::from(profile_id))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("list_attempt_numbers", e))?;
        let held = held_rows
            .iter()
            .map(|r| col::<i32>(r, "attempt_number").map(|n| u32::try_from(n).unwrap_or_default()))
            .collect::<StoreResult<Vec<u32>>>()?;

        let number = admit_attempt(held, quiz.max_attempts)?;
        let attempt = QuizAttempt::start(&quiz, profile_id, number, now);
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, company_id, quiz_id, profile_id, attempt_number, status, answers, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(attempt.id))
        .bind(Uuid::from(attempt.company_id))
        .bind(Uuid::from(attempt.quiz_id))
        .bind(Uuid::from(attempt.profile_id))
        .bind(i32::try_from(attempt.attempt_number).unwrap_or(i32::MAX))
        .bind(attempt.status.as_str())
        .bind(serde_json::json!([]))
        .bind(attempt.started_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_attempt", e))?;
        commit(tx).await?;
        Ok(attempt)
    }

    async fn get_attempt(&self, company_id: CompanyId, quiz_id: QuizId, attempt_id: AttemptId) -> StoreResult<QuizAttempt> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE company_id = $1 AND quiz_id = $2 AND id = $3");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(quiz_id))
            .bind(Uuid::from(attempt_id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_attempt", e))?
            .ok_or(StoreError::NotFound("Attempt"))?;
        attempt_from_row(&row)
    }

    async fn submit_attempt(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        profile_id: ProfileId,
        answers: Vec<AttemptAnswer>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        let mut tx = self.begin().await?;
        let quiz = fetch_quiz(&mut *tx, company_id, quiz_id, false).await?;
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE company_id = $1 AND quiz_id = $2 AND id = $3 AND profile_id = $4 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(quiz_id))
            .bind(Uuid::from(attempt_id))
            .bind(Uuid::from(profile_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_attempt", e))?
            .ok_or(StoreError::NotFound("Attempt"))?;
        let mut attempt = attempt_from_row(&row)?;

        let question_sql = format!("SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY position");
        let questions = rows(
            sqlx::query(&question_sql)
                .bind(Uuid::from(quiz_id))
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("list_questions", e))?,
            question_from_row,
        )?;
        let option_sql = format!("SELECT {OPTION_COLUMNS} FROM quiz_options WHERE quiz_id = $1 ORDER BY position");
        let options = rows(
            sqlx::query(&option_sql)
                .bind(Uuid::from(quiz_id))
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("list_options", e))?,
            option_from_row,
        )?;

        attempt.submit(answers, &questions, &options, quiz.passing_score, now)?;
        let answers_json =
            serde_json::to_value(&attempt.answers).map_err(|e| StoreError::Backend(format!("encode answers: {e}")))?;
        sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = $2, answers = $3, score = $4, passed = $5, submitted_at = $6
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(attempt.id))
        .bind(attempt.status.as_str())
        .bind(answers_json)
        .bind(attempt.score.map(i16::from))
        .bind(attempt.passed)
        .bind(attempt.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("submit_attempt", e))?;
        commit(tx).await?;
        Ok(attempt)
    }

    async fn list_attempts(&self, company_id: CompanyId, quiz_id: QuizId, profile_id: ProfileId) -> StoreResult<Vec<QuizAttempt>> {
        fetch_quiz(&*self.pool, company_id, quiz_id, false).await?;
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE quiz_id = $1 AND profile_id = $2 ORDER BY attempt_number"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(quiz_id))
            .bind(Uuid::from(profile_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_attempts", e))?;
        rows(found, attempt_from_row)
    }
}

#[async_trait]
impl AttachmentStore for PostgresLearningStore {
    async fn insert_attachment(&self, attachment: &Attachment) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let (company_id, course_id) = (attachment.company_id, attachment.course_id);
        fetch_course(&mut *tx, company_id, course_id, false).await?;
        let (chapter_id, block_id) = match attachment.target {
            AttachmentTarget::Course => (None, None),
            AttachmentTarget::Chapter(chapter_id) => {
                fetch_chapter(&mut *tx, company_id, course_id, chapter_id, false).await?;
                (Some(Uuid::from(chapter_id)), None)
            }
            AttachmentTarget::Block(block_id) => {
                fetch_block(&mut *tx, company_id, course_id, block_id).await?;
                (None, Some(Uuid::from(block_id)))
            }
        };
        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, company_id, course_id, target_type, chapter_id, block_id, name, url, uploaded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::from(attachment.id))
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(course_id))
        .bind(attachment.target.kind())
        .bind(chapter_id)
        .bind(block_id)
        .bind(&attachment.name)
        .bind(&attachment.url)
        .bind(Uuid::from(attachment.uploaded_by))
        .bind(attachment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_attachment", e))?;
        commit(tx).await
    }

    async fn list_attachments(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Attachment>> {
        fetch_course(&*self.pool, company_id, course_id, false).await?;
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE company_id = $1 AND course_id = $2 ORDER BY created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_attachments", e))?;
        rows(found, attachment_from_row)
    }

    async fn delete_attachment(&self, company_id: CompanyId, course_id: CourseId, attachment_id: AttachmentId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM attachments WHERE company_id = $1 AND course_id = $2 AND id = $3")
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(course_id))
            .bind(Uuid::from(attachment_id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_attachment", e))?;
        match result.rows_affected() {
            0 => Err(StoreError::NotFound("Attachment")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BadgeStore for PostgresLearningStore {
    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO badges (id, company_id, name, description, image_url, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(badge.id))
        .bind(badge.company_id.map(Uuid::from))
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.image_url)
        .bind(badge.created_by.map(Uuid::from))
        .bind(badge.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_badge", e))?;
        Ok(())
    }

    async fn list_badges(&self, company_id: CompanyId) -> StoreResult<Vec<Badge>> {
        let sql = format!(
            "SELECT {BADGE_COLUMNS} FROM badges WHERE company_id IS NULL OR company_id = $1 \
             ORDER BY company_id IS NOT NULL, lower(name)"
        );
        let found = sqlx::query(&sql)
            .bind(Uuid::from(company_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_badges", e))?;
        rows(found, badge_from_row)
    }
}
