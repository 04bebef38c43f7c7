//! Application-level orchestration over a [`LearningStore`].
//!
//! Handlers decide *whether* an actor may do something (capability policy);
//! the workflows here decide *what happens*: they build domain values with the
//! request clock, hand multi-row changes to the store as single operations,
//! and log state transitions.
//!
//! ```text
//! handler (authorized) → workflow → domain rule → store (atomic) → log
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use learnhub_auth::{IdentityId, Role};
use learnhub_core::{
    AttachmentId, AttemptId, BlockId, ChapterId, CompanyId, CourseId, EnrollmentId, LessonId, ModuleId, ProfileId,
    QuestionId, QuizId, TeamCourseId, TeamId,
};
use learnhub_learning::{
    Attachment, AttachmentDraft, AttemptAnswer, Badge, BadgeDraft, BlockDraft, CascadeOutcome, Chapter, ChapterDraft,
    ChapterPatch, Company, CompanyTeam, Course, CourseDraft, CourseModule, CoursePatch, Enrollment, EnrollmentSource,
    Lesson, LessonBlock, LessonDraft, ModuleDraft, OptionDraft, PositionUpdate, ProfileDraft, QuestionDraft, Quiz,
    QuizAttempt, QuizDraft, QuizOption, QuizQuestion, ReorderPolicy, TeamCourseAssignment, TeamDraft,
    TeamMembership, TeamPatch, TeamRole, UserProfile,
};

use crate::legacy_sync::{LegacyChapterSync, ModuleMirrorSync};
use crate::store::{InMemoryLearningStore, LearningStore, StoreError, StoreResult};

/// The profile a request acts as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Actor {
    pub company_id: CompanyId,
    pub profile_id: ProfileId,
    pub role: Role,
}

impl From<&UserProfile> for Actor {
    fn from(profile: &UserProfile) -> Self {
        Self {
            company_id: profile.company_id,
            profile_id: profile.id,
            role: profile.role,
        }
    }
}

#[derive(Clone)]
pub struct LearningWorkflows {
    store: Arc<dyn LearningStore>,
    sync: Arc<dyn LegacyChapterSync>,
    reorder_policy: ReorderPolicy,
}

impl std::fmt::Debug for LearningWorkflows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningWorkflows")
            .field("reorder_policy", &self.reorder_policy)
            .finish_non_exhaustive()
    }
}

impl LearningWorkflows {
    pub fn new(store: Arc<dyn LearningStore>, sync: Arc<dyn LegacyChapterSync>, reorder_policy: ReorderPolicy) -> Self {
        Self {
            store,
            sync,
            reorder_policy,
        }
    }

    /// In-memory store with the default module mirror sync.
    pub fn in_memory(reorder_policy: ReorderPolicy) -> Self {
        Self::new(
            Arc::new(InMemoryLearningStore::new()),
            Arc::new(ModuleMirrorSync),
            reorder_policy,
        )
    }

    /// Read access for handlers; every mutation goes through a workflow method.
    pub fn store(&self) -> &dyn LearningStore {
        self.store.as_ref()
    }

    pub fn reorder_policy(&self) -> ReorderPolicy {
        self.reorder_policy
    }

    // --- companies & profiles ---

    /// Create a company and make `identity` its first HR admin.
    #[instrument(skip(self, display_name, email), fields(identity = %identity.as_str()), err)]
    pub async fn onboard(
        &self,
        identity: &IdentityId,
        company_name: &str,
        display_name: &str,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<(Company, UserProfile)> {
        if self.store.find_profile_by_identity(identity).await?.is_some() {
            return Err(StoreError::Conflict("Identity already has a profile".into()));
        }
        let company = Company::create(company_name, now)?;
        let admin = UserProfile::create(
            company.id,
            ProfileDraft {
                identity_id: identity.clone(),
                display_name: display_name.to_string(),
                email,
                role: Role::HrAdmin,
            },
            now,
        )?;
        self.store.create_company(company.clone(), admin.clone()).await?;
        info!(company_id = %company.id, profile_id = %admin.id, "company onboarded");
        Ok((company, admin))
    }

    pub async fn create_profile(&self, actor: &Actor, draft: ProfileDraft, now: DateTime<Utc>) -> StoreResult<UserProfile> {
        let profile = UserProfile::create(actor.company_id, draft, now)?;
        self.store.insert_profile(profile.clone()).await?;
        info!(company_id = %profile.company_id, profile_id = %profile.id, role = %profile.role, "profile created");
        Ok(profile)
    }

    // --- courses ---

    /// Creates the course unpublished and enrolls its creator.
    #[instrument(skip(self, draft), fields(company_id = %actor.company_id), err)]
    pub async fn create_course(&self, actor: &Actor, draft: CourseDraft, now: DateTime<Utc>) -> StoreResult<(Course, Enrollment)> {
        let course = Course::create(actor.company_id, actor.profile_id, draft, now)?;
        let enrollment = Enrollment::new(
            actor.company_id,
            course.id,
            actor.profile_id,
            EnrollmentSource::Manual,
            None,
            now,
        );
        self.store.create_course(course.clone(), enrollment.clone()).await?;
        info!(course_id = %course.id, "course created");
        Ok((course, enrollment))
    }

    pub async fn update_course(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        patch: CoursePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Course> {
        let mut course = self.store.get_course(company_id, course_id).await?;
        course.apply_patch(patch, now)?;
        self.store.save_course(&course).await?;
        Ok(course)
    }

    pub async fn delete_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<()> {
        self.store.delete_course(company_id, course_id).await?;
        info!(%course_id, "course deleted");
        Ok(())
    }

    /// Publishes the course and runs the legacy chapter sync in the same store operation.
    #[instrument(skip(self, now), err)]
    pub async fn publish_course(&self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>) -> StoreResult<Course> {
        let course = self
            .store
            .publish_course(company_id, course_id, self.sync.as_ref(), now)
            .await?;
        info!(%course_id, "course published");
        Ok(course)
    }

    #[instrument(skip(self, now), err)]
    pub async fn unpublish_course(&self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>) -> StoreResult<Course> {
        let course = self.store.unpublish_course(company_id, course_id, now).await?;
        info!(%course_id, "course unpublished");
        Ok(course)
    }

    // --- chapters ---

    pub async fn append_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ChapterDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let chapter = self.store.append_chapter(company_id, course_id, draft, now).await?;
        debug!(chapter_id = %chapter.id, position = chapter.position, "chapter appended");
        Ok(chapter)
    }

    pub async fn update_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        patch: ChapterPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        self.store.update_chapter(company_id, course_id, chapter_id, patch, now).await
    }

    /// Fails with `Missing required fields` unless the chapter is content-complete.
    #[instrument(skip(self, now), err)]
    pub async fn publish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let chapter = self.store.publish_chapter(company_id, course_id, chapter_id, now).await?;
        info!(%chapter_id, "chapter published");
        Ok(chapter)
    }

    #[instrument(skip(self, now), err)]
    pub async fn unpublish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Chapter, CascadeOutcome)> {
        let (chapter, outcome) = self
            .store
            .unpublish_chapter(company_id, course_id, chapter_id, now)
            .await?;
        info!(%chapter_id, "chapter unpublished");
        log_cascade(course_id, outcome);
        Ok((chapter, outcome))
    }

    #[instrument(skip(self, now), err)]
    pub async fn delete_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<CascadeOutcome> {
        let outcome = self.store.delete_chapter(company_id, course_id, chapter_id, now).await?;
        info!(%chapter_id, "chapter deleted");
        log_cascade(course_id, outcome);
        Ok(outcome)
    }

    /// Validates the list against the configured policy, then applies it in one store call.
    pub async fn reorder_chapters(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        updates: &[PositionUpdate<ChapterId>],
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.reorder_policy.validate(updates)?;
        let changed = self.store.reorder_chapters(company_id, course_id, updates, now).await?;
        debug!(%course_id, requested = updates.len(), changed, "chapters reordered");
        Ok(changed)
    }

    // --- curriculum ---

    pub async fn append_module(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ModuleDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<CourseModule> {
        self.store.append_module(company_id, course_id, draft, now).await
    }

    pub async fn append_lesson(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        module_id: ModuleId,
        draft: LessonDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Lesson> {
        self.store.append_lesson(company_id, course_id, module_id, draft, now).await
    }

    pub async fn append_block(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        lesson_id: LessonId,
        draft: BlockDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonBlock> {
        self.store.append_block(company_id, course_id, lesson_id, draft, now).await
    }

    // --- attachments & badges ---

    pub async fn add_attachment(
        &self,
        actor: &Actor,
        course_id: CourseId,
        draft: AttachmentDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Attachment> {
        let course = self.store.get_course(actor.company_id, course_id).await?;
        let attachment = Attachment::create(&course, actor.profile_id, draft, now)?;
        self.store.insert_attachment(&attachment).await?;
        Ok(attachment)
    }

    pub async fn delete_attachment(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        attachment_id: AttachmentId,
    ) -> StoreResult<()> {
        self.store.delete_attachment(company_id, course_id, attachment_id).await
    }

    pub async fn create_badge(&self, actor: &Actor, draft: BadgeDraft, now: DateTime<Utc>) -> StoreResult<Badge> {
        let badge = Badge::create(actor.company_id, actor.profile_id, draft, now)?;
        self.store.insert_badge(&badge).await?;
        Ok(badge)
    }

    // --- enrollments ---

    /// Idempotent on (course, profile); the flag is `true` when a row was created.
    #[instrument(skip(self, now), fields(company_id = %actor.company_id), err)]
    pub async fn enroll(
        &self,
        actor: &Actor,
        course_id: CourseId,
        profile_id: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Enrollment, bool)> {
        let enrollment = Enrollment::new(
            actor.company_id,
            course_id,
            profile_id,
            EnrollmentSource::Manual,
            Some(actor.profile_id),
            now,
        );
        let (enrollment, created) = self.store.enroll(enrollment).await?;
        if created {
            info!(enrollment_id = %enrollment.id, %course_id, %profile_id, "profile enrolled");
        }
        Ok((enrollment, created))
    }

    pub async fn record_progress(
        &self,
        company_id: CompanyId,
        enrollment_id: EnrollmentId,
        progress: u8,
        now: DateTime<Utc>,
    ) -> StoreResult<Enrollment> {
        let mut enrollment = self.store.get_enrollment(company_id, enrollment_id).await?;
        enrollment.record_progress(progress, now)?;
        self.store.save_enrollment(&enrollment).await?;
        debug!(%enrollment_id, progress, status = enrollment.status.as_str(), "progress recorded");
        Ok(enrollment)
    }

    // --- teams ---

    pub async fn create_team(&self, actor: &Actor, draft: TeamDraft, now: DateTime<Utc>) -> StoreResult<CompanyTeam> {
        let team = CompanyTeam::create(actor.company_id, actor.profile_id, draft, now)?;
        self.store.insert_team(&team).await?;
        info!(team_id = %team.id, "team created");
        Ok(team)
    }

    pub async fn update_team(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        patch: TeamPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<CompanyTeam> {
        let mut team = self.store.get_team(company_id, team_id).await?;
        team.apply_patch(patch, now)?;
        self.store.save_team(&team).await?;
        Ok(team)
    }

    pub async fn delete_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<()> {
        self.store.delete_team(company_id, team_id).await?;
        info!(%team_id, "team deleted");
        Ok(())
    }

    /// Adds the profile, or replaces its role when it is already a member.
    pub async fn upsert_member(
        &self,
        actor: &Actor,
        team_id: TeamId,
        profile_id: ProfileId,
        role: Option<TeamRole>,
        now: DateTime<Utc>,
    ) -> StoreResult<TeamMembership> {
        let membership = self
            .store
            .upsert_member(actor.company_id, team_id, profile_id, role, actor.profile_id, now)
            .await?;
        debug!(%team_id, %profile_id, role = membership.role.as_str(), "team member upserted");
        Ok(membership)
    }

    pub async fn remove_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<()> {
        self.store.remove_member(company_id, team_id, profile_id).await?;
        info!(%team_id, %profile_id, "team member removed");
        Ok(())
    }

    /// Assigns the course and enrolls every current member not yet enrolled.
    #[instrument(skip(self, due_at, now), fields(company_id = %actor.company_id), err)]
    pub async fn assign_course(
        &self,
        actor: &Actor,
        team_id: TeamId,
        course_id: CourseId,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<(TeamCourseAssignment, Vec<Enrollment>)> {
        let (assignment, enrolled) = self
            .store
            .assign_course(actor.company_id, team_id, course_id, actor.profile_id, due_at, now)
            .await?;
        info!(
            assignment_id = %assignment.id,
            enrolled = enrolled.len(),
            "course assigned to team"
        );
        Ok((assignment, enrolled))
    }

    /// Enrollments created by the assignment stay in place.
    pub async fn unassign_course(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<()> {
        self.store.remove_assignment(company_id, team_id, assignment_id).await?;
        info!(%team_id, %assignment_id, "team course assignment removed");
        Ok(())
    }

    // --- quizzes ---

    pub async fn create_quiz(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        block_id: BlockId,
        draft: QuizDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Quiz> {
        let quiz = self.store.create_quiz(company_id, course_id, block_id, draft, now).await?;
        info!(quiz_id = %quiz.id, %block_id, "quiz created");
        Ok(quiz)
    }

    pub async fn add_question(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        draft: QuestionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizQuestion> {
        self.store.add_question(company_id, quiz_id, draft, now).await
    }

    pub async fn add_option(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        question_id: QuestionId,
        draft: OptionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizOption> {
        self.store.add_option(company_id, quiz_id, question_id, draft, now).await
    }

    /// Admission and insert happen in one store operation, so two concurrent
    /// starts never share an attempt number.
    #[instrument(skip(self, now), fields(company_id = %actor.company_id, profile_id = %actor.profile_id), err)]
    pub async fn start_attempt(&self, actor: &Actor, quiz_id: QuizId, now: DateTime<Utc>) -> StoreResult<QuizAttempt> {
        let attempt = self
            .store
            .start_attempt(actor.company_id, quiz_id, actor.profile_id, now)
            .await?;
        info!(attempt_id = %attempt.id, attempt_number = attempt.attempt_number, "quiz attempt started");
        Ok(attempt)
    }

    /// Only the profile that started the attempt can submit it.
    #[instrument(skip(self, answers, now), fields(company_id = %actor.company_id), err)]
    pub async fn submit_attempt(
        &self,
        actor: &Actor,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        answers: Vec<AttemptAnswer>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        let attempt = self
            .store
            .submit_attempt(actor.company_id, quiz_id, attempt_id, actor.profile_id, answers, now)
            .await?;
        info!(
            %attempt_id,
            score = attempt.score.unwrap_or_default(),
            passed = attempt.passed.unwrap_or_default(),
            "quiz attempt submitted"
        );
        Ok(attempt)
    }
}

fn log_cascade(course_id: CourseId, outcome: CascadeOutcome) {
    if outcome == CascadeOutcome::CourseUnpublished {
        info!(%course_id, "no published chapter left; course unpublished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_core::DomainError;
    use learnhub_learning::{BlockKind, EnrollmentStatus};

    fn workflows() -> LearningWorkflows {
        LearningWorkflows::in_memory(ReorderPolicy::Loose)
    }

    async fn onboard(w: &LearningWorkflows, subject: &str) -> Actor {
        let (_, admin) = w
            .onboard(&IdentityId::new(subject), "Acme", "Ada", None, Utc::now())
            .await
            .unwrap();
        Actor::from(&admin)
    }

    async fn hire(w: &LearningWorkflows, admin: &Actor, subject: &str, role: Role) -> Actor {
        let profile = w
            .create_profile(
                admin,
                ProfileDraft {
                    identity_id: IdentityId::new(subject),
                    display_name: subject.into(),
                    email: None,
                    role,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        Actor::from(&profile)
    }

    fn draft(title: &str) -> CourseDraft {
        CourseDraft {
            title: title.into(),
            ..Default::default()
        }
    }

    fn complete_chapter(title: &str) -> ChapterDraft {
        ChapterDraft {
            title: title.into(),
            description: Some("what you will learn".into()),
            video_url: Some("https://cdn.example/v.mp4".into()),
            content_url: None,
        }
    }

    #[tokio::test]
    async fn onboarding_twice_with_same_identity_conflicts() {
        let w = workflows();
        onboard(&w, "idp|1").await;

        let err = w
            .onboard(&IdentityId::new("idp|1"), "Other", "Ada", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn onboarded_identity_is_hr_admin() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        assert_eq!(admin.role, Role::HrAdmin);

        let found = w
            .store()
            .find_profile_by_identity(&IdentityId::new("idp|1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, admin.profile_id);
    }

    #[tokio::test]
    async fn incomplete_chapter_cannot_be_published() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let chapter = w
            .append_chapter(
                admin.company_id,
                course.id,
                ChapterDraft {
                    title: "Intro".into(),
                    description: Some("desc".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let err = w
            .publish_chapter(admin.company_id, course.id, chapter.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(ref m)) if m == "Missing required fields"));
        assert!(
            !w.store()
                .get_chapter(admin.company_id, course.id, chapter.id)
                .await
                .unwrap()
                .is_published
        );
    }

    #[tokio::test]
    async fn unpublishing_one_of_two_chapters_keeps_course_published() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let a = w
            .append_chapter(admin.company_id, course.id, complete_chapter("A"), Utc::now())
            .await
            .unwrap();
        let b = w
            .append_chapter(admin.company_id, course.id, complete_chapter("B"), Utc::now())
            .await
            .unwrap();
        for id in [a.id, b.id] {
            w.publish_chapter(admin.company_id, course.id, id, Utc::now()).await.unwrap();
        }
        w.publish_course(admin.company_id, course.id, Utc::now()).await.unwrap();

        let (_, outcome) = w
            .unpublish_chapter(admin.company_id, course.id, a.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::CourseUntouched);
        assert!(w.store().get_course(admin.company_id, course.id).await.unwrap().is_published);

        let outcome = w
            .delete_chapter(admin.company_id, course.id, b.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, CascadeOutcome::CourseUnpublished);
        assert!(!w.store().get_course(admin.company_id, course.id).await.unwrap().is_published);
    }

    #[tokio::test]
    async fn editing_a_published_chapter_never_reverts_its_publication() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let chapter = w
            .append_chapter(admin.company_id, course.id, complete_chapter("A"), Utc::now())
            .await
            .unwrap();

        // Edit and publish race from two requests; the edit touches content only.
        let (edited, published) = tokio::join!(
            w.update_chapter(
                admin.company_id,
                course.id,
                chapter.id,
                ChapterPatch {
                    description: Some("Updated".into()),
                    ..Default::default()
                },
                Utc::now(),
            ),
            w.publish_chapter(admin.company_id, course.id, chapter.id, Utc::now()),
        );
        edited.unwrap();
        published.unwrap();
        w.publish_course(admin.company_id, course.id, Utc::now()).await.unwrap();

        w.update_chapter(
            admin.company_id,
            course.id,
            chapter.id,
            ChapterPatch {
                title: Some("Renamed".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let stored = w
            .store()
            .get_chapter(admin.company_id, course.id, chapter.id)
            .await
            .unwrap();
        assert!(stored.is_published);
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.description.as_deref(), Some("Updated"));
        assert!(w.store().get_course(admin.company_id, course.id).await.unwrap().is_published);
    }

    #[tokio::test]
    async fn strict_reorder_rejects_gaps_before_touching_the_store() {
        let w = LearningWorkflows::in_memory(ReorderPolicy::Strict);
        let admin = onboard(&w, "idp|1").await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let a = w
            .append_chapter(admin.company_id, course.id, complete_chapter("A"), Utc::now())
            .await
            .unwrap();
        let b = w
            .append_chapter(admin.company_id, course.id, complete_chapter("B"), Utc::now())
            .await
            .unwrap();

        let gap = [
            PositionUpdate { id: a.id, position: 1 },
            PositionUpdate { id: b.id, position: 3 },
        ];
        let err = w
            .reorder_chapters(admin.company_id, course.id, &gap, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));

        let swap = [
            PositionUpdate { id: a.id, position: 2 },
            PositionUpdate { id: b.id, position: 1 },
        ];
        assert_eq!(
            w.reorder_chapters(admin.company_id, course.id, &swap, Utc::now())
                .await
                .unwrap(),
            2
        );
        let titles: Vec<String> = w
            .store()
            .list_chapters(admin.company_id, course.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, ["B", "A"]);
    }

    #[tokio::test]
    async fn manual_enrollment_is_idempotent() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let learner = hire(&w, &admin, "idp|2", Role::Learner).await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();

        let (first, created) = w.enroll(&admin, course.id, learner.profile_id, Utc::now()).await.unwrap();
        assert!(created);
        assert_eq!(first.assigned_by, Some(admin.profile_id));
        let (second, created) = w.enroll(&admin, course.id, learner.profile_id, Utc::now()).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn progress_drives_enrollment_status() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let (_, enrollment) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();

        let updated = w
            .record_progress(admin.company_id, enrollment.id, 100, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.status, EnrollmentStatus::Completed);
        assert!(updated.completed_at.is_some());

        let err = w
            .record_progress(admin.company_id, enrollment.id, 101, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn team_assignment_skips_existing_enrollments() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let a = hire(&w, &admin, "idp|2", Role::Learner).await;
        let b = hire(&w, &admin, "idp|3", Role::Learner).await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let team = w
            .create_team(
                &admin,
                TeamDraft {
                    name: "Ops".into(),
                    description: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        for member in [a.profile_id, b.profile_id] {
            w.upsert_member(&admin, team.id, member, None, Utc::now()).await.unwrap();
        }
        w.enroll(&admin, course.id, a.profile_id, Utc::now()).await.unwrap();

        let (_, enrolled) = w
            .assign_course(&admin, team.id, course.id, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].profile_id, b.profile_id);
        assert_eq!(enrolled[0].source, EnrollmentSource::Team);

        let err = w
            .assign_course(&admin, team.id, course.id, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn quiz_flow_scores_and_limits_attempts() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let learner = hire(&w, &admin, "idp|2", Role::Learner).await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let module = w
            .append_module(
                admin.company_id,
                course.id,
                ModuleDraft {
                    title: "Basics".into(),
                    description: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let lesson = w
            .append_lesson(
                admin.company_id,
                course.id,
                module.id,
                LessonDraft { title: "Check".into() },
                Utc::now(),
            )
            .await
            .unwrap();
        let block = w
            .append_block(
                admin.company_id,
                course.id,
                lesson.id,
                BlockDraft {
                    kind: BlockKind::Quiz,
                    content: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let quiz = w
            .create_quiz(
                admin.company_id,
                course.id,
                block.id,
                QuizDraft {
                    title: "Check".into(),
                    max_attempts: Some(1),
                    passing_score: Some(50),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let question = w
            .add_question(admin.company_id, quiz.id, QuestionDraft { prompt: "2+2?".into() }, Utc::now())
            .await
            .unwrap();
        let right = w
            .add_option(
                admin.company_id,
                quiz.id,
                question.id,
                OptionDraft {
                    text: "4".into(),
                    is_correct: true,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let attempt = w.start_attempt(&learner, quiz.id, Utc::now()).await.unwrap();
        assert_eq!(attempt.attempt_number, 1);

        let err = w.start_attempt(&learner, quiz.id, Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "Max attempts reached");

        let err = w
            .submit_attempt(&admin, quiz.id, attempt.id, Vec::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Attempt")));

        let submitted = w
            .submit_attempt(
                &learner,
                quiz.id,
                attempt.id,
                vec![AttemptAnswer {
                    question_id: question.id,
                    option_id: right.id,
                }],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(submitted.score, Some(100));
        assert_eq!(submitted.passed, Some(true));
    }

    #[tokio::test]
    async fn attachment_targets_must_belong_to_the_course() {
        let w = workflows();
        let admin = onboard(&w, "idp|1").await;
        let (course, _) = w.create_course(&admin, draft("Safety"), Utc::now()).await.unwrap();
        let (other, _) = w.create_course(&admin, draft("Other"), Utc::now()).await.unwrap();
        let chapter = w
            .append_chapter(admin.company_id, other.id, complete_chapter("A"), Utc::now())
            .await
            .unwrap();

        let err = w
            .add_attachment(
                &admin,
                course.id,
                AttachmentDraft {
                    name: "Slides".into(),
                    url: "https://files.example/slides.pdf".into(),
                    chapter_id: Some(chapter.id),
                    block_id: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Chapter")));
    }
}
