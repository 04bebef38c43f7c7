//! In-memory store for tests/dev.
//!
//! All tables sit behind one `RwLock`, so every trait method is atomic with
//! respect to every other one.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use learnhub_auth::IdentityId;
use learnhub_core::{
    AttachmentId, AttemptId, BadgeId, BlockId, ChapterId, CompanyId, CourseId, EnrollmentId, LessonId, ModuleId,
    OptionId, ProfileId, QuestionId, QuizId, TeamCourseId, TeamId, TenantScoped,
};
use learnhub_learning::{
    Attachment, AttachmentTarget, AttemptAnswer, Badge, BlockDraft, CascadeOutcome, Chapter, ChapterDraft, ChapterPatch,
    Company, CompanyTeam, Course, CourseModule, Enrollment, EnrollmentSource, Lesson, LessonBlock, LessonDraft, ModuleDraft,
    OptionDraft, PositionUpdate, QuestionDraft, Quiz, QuizAttempt, QuizDraft, QuizOption, QuizQuestion,
    TeamCourseAssignment, TeamMembership, TeamRole, UserProfile, admit_attempt, cascade_after_unpublish,
    next_position,
};

use super::{
    AttachmentStore, BadgeStore, ChapterStore, CompanyStore, CourseStore, CurriculumStore, EnrollmentStore,
    QuizStore, StoreError, StoreResult, TeamStore,
};
use crate::legacy_sync::LegacyChapterSync;

#[derive(Debug, Default)]
struct Tables {
    companies: HashMap<CompanyId, Company>,
    profiles: HashMap<ProfileId, UserProfile>,
    identities: HashMap<IdentityId, ProfileId>,
    courses: HashMap<CourseId, Course>,
    chapters: HashMap<ChapterId, Chapter>,
    modules: HashMap<ModuleId, CourseModule>,
    lessons: HashMap<LessonId, Lesson>,
    blocks: HashMap<BlockId, LessonBlock>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    teams: HashMap<TeamId, CompanyTeam>,
    memberships: HashMap<(TeamId, ProfileId), TeamMembership>,
    assignments: HashMap<TeamCourseId, TeamCourseAssignment>,
    quizzes: HashMap<QuizId, Quiz>,
    questions: HashMap<QuestionId, QuizQuestion>,
    options: HashMap<OptionId, QuizOption>,
    attempts: HashMap<AttemptId, QuizAttempt>,
    attachments: HashMap<AttachmentId, Attachment>,
    badges: HashMap<BadgeId, Badge>,
}

/// Lookup that treats a row of another company as missing.
fn scoped<'a, K, V>(map: &'a HashMap<K, V>, company_id: CompanyId, key: &K, what: &'static str) -> StoreResult<&'a V>
where
    K: Eq + Hash,
    V: TenantScoped,
{
    map.get(key)
        .filter(|v| v.belongs_to(company_id))
        .ok_or(StoreError::NotFound(what))
}

fn scoped_mut<'a, K, V>(
    map: &'a mut HashMap<K, V>,
    company_id: CompanyId,
    key: &K,
    what: &'static str,
) -> StoreResult<&'a mut V>
where
    K: Eq + Hash,
    V: TenantScoped,
{
    map.get_mut(key)
        .filter(|v| v.belongs_to(company_id))
        .ok_or(StoreError::NotFound(what))
}

/// Values of `map` owned by `company_id` and matching `pred`, sorted by `key`.
fn collect_sorted<K, V, O, P, S>(map: &HashMap<K, V>, company_id: CompanyId, pred: P, key: S) -> Vec<V>
where
    V: TenantScoped + Clone,
    P: Fn(&V) -> bool,
    S: Fn(&V) -> O,
    O: Ord,
{
    let mut out: Vec<V> = map
        .values()
        .filter(|v| v.belongs_to(company_id) && pred(v))
        .cloned()
        .collect();
    out.sort_by_key(key);
    out
}

impl Tables {
    fn course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<&Course> {
        scoped(&self.courses, company_id, &course_id, "Course")
    }

    fn profile(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<&UserProfile> {
        scoped(&self.profiles, company_id, &profile_id, "Profile")
    }

    fn team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<&CompanyTeam> {
        scoped(&self.teams, company_id, &team_id, "Team")
    }

    fn quiz(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<&Quiz> {
        scoped(&self.quizzes, company_id, &quiz_id, "Quiz")
    }

    fn chapter_of_course(&self, company_id: CompanyId, course_id: CourseId, chapter_id: ChapterId) -> StoreResult<&Chapter> {
        scoped(&self.chapters, company_id, &chapter_id, "Chapter")
            .ok()
            .filter(|c| c.course_id == course_id)
            .ok_or(StoreError::NotFound("Chapter"))
    }

    fn chapter_of_course_mut(
        &mut self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> StoreResult<&mut Chapter> {
        scoped_mut(&mut self.chapters, company_id, &chapter_id, "Chapter")
            .ok()
            .filter(|c| c.course_id == course_id)
            .ok_or(StoreError::NotFound("Chapter"))
    }

    fn block_of_course(&self, company_id: CompanyId, course_id: CourseId, block_id: BlockId) -> StoreResult<&LessonBlock> {
        scoped(&self.blocks, company_id, &block_id, "Block")
            .ok()
            .filter(|b| b.course_id == course_id)
            .ok_or(StoreError::NotFound("Block"))
    }

    fn published_chapters(&self, course_id: CourseId) -> usize {
        self.chapters
            .values()
            .filter(|c| c.course_id == course_id && c.is_published)
            .count()
    }

    fn cascade(&mut self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>) -> StoreResult<CascadeOutcome> {
        let remaining = self.published_chapters(course_id);
        let course = scoped_mut(&mut self.courses, company_id, &course_id, "Course")?;
        Ok(cascade_after_unpublish(course, remaining, now))
    }

    /// Inserts unless (course, profile) is already enrolled.
    fn enroll_once(&mut self, enrollment: Enrollment) -> (Enrollment, bool) {
        let existing = self
            .enrollments
            .values()
            .find(|e| e.course_id == enrollment.course_id && e.profile_id == enrollment.profile_id);
        if let Some(existing) = existing {
            return (existing.clone(), false);
        }
        self.enrollments.insert(enrollment.id, enrollment.clone());
        (enrollment, true)
    }

    fn remove_course_tree(&mut self, course_id: CourseId) {
        let quiz_ids: Vec<QuizId> = self
            .quizzes
            .values()
            .filter(|q| q.course_id == course_id)
            .map(|q| q.id)
            .collect();

        self.chapters.retain(|_, c| c.course_id != course_id);
        self.modules.retain(|_, m| m.course_id != course_id);
        self.lessons.retain(|_, l| l.course_id != course_id);
        self.blocks.retain(|_, b| b.course_id != course_id);
        self.enrollments.retain(|_, e| e.course_id != course_id);
        self.assignments.retain(|_, a| a.course_id != course_id);
        self.attachments.retain(|_, a| a.course_id != course_id);
        self.quizzes.retain(|_, q| q.course_id != course_id);
        self.questions.retain(|_, q| !quiz_ids.contains(&q.quiz_id));
        self.options.retain(|_, o| !quiz_ids.contains(&o.quiz_id));
        self.attempts.retain(|_, a| !quiz_ids.contains(&a.quiz_id));
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLearningStore {
    tables: RwLock<Tables>,
}

impl InMemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl CompanyStore for InMemoryLearningStore {
    async fn create_company(&self, company: Company, admin: UserProfile) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.identities.contains_key(&admin.identity_id) {
            return Err(StoreError::Conflict("Identity already has a profile".into()));
        }
        t.identities.insert(admin.identity_id.clone(), admin.id);
        t.profiles.insert(admin.id, admin);
        t.companies.insert(company.id, company);
        Ok(())
    }

    async fn get_company(&self, company_id: CompanyId) -> StoreResult<Company> {
        let t = self.read()?;
        t.companies.get(&company_id).cloned().ok_or(StoreError::NotFound("Company"))
    }

    async fn find_profile_by_identity(&self, identity: &IdentityId) -> StoreResult<Option<UserProfile>> {
        let t = self.read()?;
        Ok(t.identities.get(identity).and_then(|id| t.profiles.get(id)).cloned())
    }

    async fn get_profile(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<UserProfile> {
        let t = self.read()?;
        t.profile(company_id, profile_id).cloned()
    }

    async fn list_profiles(&self, company_id: CompanyId) -> StoreResult<Vec<UserProfile>> {
        let t = self.read()?;
        Ok(collect_sorted(&t.profiles, company_id, |_| true, |p| (p.created_at, p.id)))
    }

    async fn insert_profile(&self, profile: UserProfile) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.companies.contains_key(&profile.company_id) {
            return Err(StoreError::NotFound("Company"));
        }
        if t.identities.contains_key(&profile.identity_id) {
            return Err(StoreError::Conflict("Identity already has a profile".into()));
        }
        t.identities.insert(profile.identity_id.clone(), profile.id);
        t.profiles.insert(profile.id, profile);
        Ok(())
    }
}

#[async_trait]
impl CourseStore for InMemoryLearningStore {
    async fn create_course(&self, course: Course, creator_enrollment: Enrollment) -> StoreResult<()> {
        let mut t = self.write()?;
        t.profile(course.company_id, course.created_by)?;
        t.courses.insert(course.id, course);
        t.enroll_once(creator_enrollment);
        Ok(())
    }

    async fn get_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Course> {
        let t = self.read()?;
        t.course(company_id, course_id).cloned()
    }

    async fn list_courses(&self, company_id: CompanyId) -> StoreResult<Vec<Course>> {
        let t = self.read()?;
        let mut courses = collect_sorted(&t.courses, company_id, |_| true, |c| (c.created_at, c.id));
        courses.reverse();
        Ok(courses)
    }

    async fn save_course(&self, course: &Course) -> StoreResult<()> {
        let mut t = self.write()?;
        let slot = scoped_mut(&mut t.courses, course.company_id, &course.id, "Course")?;
        *slot = course.clone();
        Ok(())
    }

    async fn delete_course(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<()> {
        let mut t = self.write()?;
        t.course(company_id, course_id)?;
        t.courses.remove(&course_id);
        t.remove_course_tree(course_id);
        Ok(())
    }

    async fn publish_course(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        sync: &dyn LegacyChapterSync,
        now: DateTime<Utc>,
    ) -> StoreResult<Course> {
        let mut t = self.write()?;
        let mut course = t.course(company_id, course_id)?.clone();
        course.publish(now);

        let modules = collect_sorted(&t.modules, company_id, |m| m.course_id == course_id, |m| m.position);
        let chapters = collect_sorted(&t.chapters, company_id, |c| c.course_id == course_id, |c| c.position);
        let writes = sync.plan(&course, &modules, &chapters, now)?;

        for chapter in writes {
            t.chapters.insert(chapter.id, chapter);
        }
        t.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn unpublish_course(&self, company_id: CompanyId, course_id: CourseId, now: DateTime<Utc>) -> StoreResult<Course> {
        let mut t = self.write()?;
        let course = scoped_mut(&mut t.courses, company_id, &course_id, "Course")?;
        course.unpublish(now);
        Ok(course.clone())
    }
}

#[async_trait]
impl ChapterStore for InMemoryLearningStore {
    async fn list_chapters(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Chapter>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(
            &t.chapters,
            company_id,
            |c| c.course_id == course_id,
            |c| (c.position, c.created_at, c.id),
        ))
    }

    async fn get_chapter(&self, company_id: CompanyId, course_id: CourseId, chapter_id: ChapterId) -> StoreResult<Chapter> {
        let t = self.read()?;
        t.chapter_of_course(company_id, course_id, chapter_id).cloned()
    }

    async fn append_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ChapterDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let mut t = self.write()?;
        let course = t.course(company_id, course_id)?;
        let position = next_position(
            t.chapters
                .values()
                .filter(|c| c.course_id == course_id)
                .map(|c| c.position),
        );
        let chapter = Chapter::create(course, draft, position, now)?;
        t.chapters.insert(chapter.id, chapter.clone());
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
        let mut t = self.write()?;
        let chapter = t.chapter_of_course_mut(company_id, course_id, chapter_id)?;
        chapter.apply_patch(patch, now)?;
        Ok(chapter.clone())
    }

    async fn publish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<Chapter> {
        let mut t = self.write()?;
        let chapter = t.chapter_of_course_mut(company_id, course_id, chapter_id)?;
        chapter.publish(now)?;
        Ok(chapter.clone())
    }

    async fn delete_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<CascadeOutcome> {
        let mut t = self.write()?;
        let was_published = t.chapter_of_course(company_id, course_id, chapter_id)?.is_published;
        t.chapters.remove(&chapter_id);
        t.attachments
            .retain(|_, a| a.target != AttachmentTarget::Chapter(chapter_id));
        if was_published {
            t.cascade(company_id, course_id, now)
        } else {
            Ok(CascadeOutcome::CourseUntouched)
        }
    }

    async fn unpublish_chapter(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        chapter_id: ChapterId,
        now: DateTime<Utc>,
    ) -> StoreResult<(Chapter, CascadeOutcome)> {
        let mut t = self.write()?;
        let chapter = t.chapter_of_course_mut(company_id, course_id, chapter_id)?;
        chapter.unpublish(now);
        let chapter = chapter.clone();
        let outcome = t.cascade(company_id, course_id, now)?;
        Ok((chapter, outcome))
    }

    async fn reorder_chapters(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        updates: &[PositionUpdate<ChapterId>],
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut t = self.write()?;
        t.course(company_id, course_id)?;
        let mut changed = 0;
        for update in updates {
            let Some(chapter) = t
                .chapters
                .get_mut(&update.id)
                .filter(|c| c.belongs_to(company_id) && c.course_id == course_id)
            else {
                continue;
            };
            chapter.position = update.position;
            chapter.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl CurriculumStore for InMemoryLearningStore {
    async fn list_modules(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<CourseModule>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(&t.modules, company_id, |m| m.course_id == course_id, |m| (m.position, m.id)))
    }

    async fn append_module(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        draft: ModuleDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<CourseModule> {
        let mut t = self.write()?;
        let course = t.course(company_id, course_id)?;
        let position = next_position(
            t.modules
                .values()
                .filter(|m| m.course_id == course_id)
                .map(|m| m.position),
        );
        let module = CourseModule::create(course, draft, position, now)?;
        t.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn list_lessons(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Lesson>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(
            &t.lessons,
            company_id,
            |l| l.course_id == course_id,
            |l| (l.module_id, l.position, l.id),
        ))
    }

    async fn append_lesson(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        module_id: ModuleId,
        draft: LessonDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Lesson> {
        let mut t = self.write()?;
        let module = scoped(&t.modules, company_id, &module_id, "Module")?;
        if module.course_id != course_id {
            return Err(StoreError::NotFound("Module"));
        }
        let position = next_position(
            t.lessons
                .values()
                .filter(|l| l.module_id == module_id)
                .map(|l| l.position),
        );
        let lesson = Lesson::create(module, draft, position, now)?;
        t.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn list_blocks(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<LessonBlock>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(
            &t.blocks,
            company_id,
            |b| b.course_id == course_id,
            |b| (b.lesson_id, b.position, b.id),
        ))
    }

    async fn append_block(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        lesson_id: LessonId,
        draft: BlockDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonBlock> {
        let mut t = self.write()?;
        let lesson = scoped(&t.lessons, company_id, &lesson_id, "Lesson")?;
        if lesson.course_id != course_id {
            return Err(StoreError::NotFound("Lesson"));
        }
        let position = next_position(
            t.blocks
                .values()
                .filter(|b| b.lesson_id == lesson_id)
                .map(|b| b.position),
        );
        let block = LessonBlock::create(lesson, draft, position, now);
        t.blocks.insert(block.id, block.clone());
        Ok(block)
    }

    async fn get_block(&self, company_id: CompanyId, course_id: CourseId, block_id: BlockId) -> StoreResult<LessonBlock> {
        let t = self.read()?;
        t.block_of_course(company_id, course_id, block_id).cloned()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryLearningStore {
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)> {
        let mut t = self.write()?;
        t.course(enrollment.company_id, enrollment.course_id)?;
        t.profile(enrollment.company_id, enrollment.profile_id)?;
        Ok(t.enroll_once(enrollment))
    }

    async fn get_enrollment(&self, company_id: CompanyId, enrollment_id: EnrollmentId) -> StoreResult<Enrollment> {
        let t = self.read()?;
        scoped(&t.enrollments, company_id, &enrollment_id, "Enrollment").cloned()
    }

    async fn list_course_enrollments(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Enrollment>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(
            &t.enrollments,
            company_id,
            |e| e.course_id == course_id,
            |e| (e.created_at, e.id),
        ))
    }

    async fn list_profile_enrollments(&self, company_id: CompanyId, profile_id: ProfileId) -> StoreResult<Vec<Enrollment>> {
        let t = self.read()?;
        Ok(collect_sorted(
            &t.enrollments,
            company_id,
            |e| e.profile_id == profile_id,
            |e| (e.created_at, e.id),
        ))
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()> {
        let mut t = self.write()?;
        let slot = scoped_mut(&mut t.enrollments, enrollment.company_id, &enrollment.id, "Enrollment")?;
        *slot = enrollment.clone();
        Ok(())
    }
}

#[async_trait]
impl TeamStore for InMemoryLearningStore {
    async fn insert_team(&self, team: &CompanyTeam) -> StoreResult<()> {
        let mut t = self.write()?;
        t.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn get_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<CompanyTeam> {
        let t = self.read()?;
        t.team(company_id, team_id).cloned()
    }

    async fn list_teams(&self, company_id: CompanyId) -> StoreResult<Vec<CompanyTeam>> {
        let t = self.read()?;
        Ok(collect_sorted(&t.teams, company_id, |_| true, |team| team.name.to_lowercase()))
    }

    async fn save_team(&self, team: &CompanyTeam) -> StoreResult<()> {
        let mut t = self.write()?;
        let slot = scoped_mut(&mut t.teams, team.company_id, &team.id, "Team")?;
        *slot = team.clone();
        Ok(())
    }

    async fn delete_team(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<()> {
        let mut t = self.write()?;
        t.team(company_id, team_id)?;
        t.teams.remove(&team_id);
        t.memberships.retain(|(team, _), _| *team != team_id);
        t.assignments.retain(|_, a| a.team_id != team_id);
        Ok(())
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
        let mut t = self.write()?;
        let team = t.team(company_id, team_id)?.clone();
        t.profile(company_id, profile_id)?;
        let existing = t.memberships.get(&(team_id, profile_id)).cloned();
        let membership = TeamMembership::upsert(existing, &team, profile_id, role, actor, now);
        t.memberships.insert((team_id, profile_id), membership.clone());
        Ok(membership)
    }

    async fn get_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<TeamMembership> {
        let t = self.read()?;
        scoped(&t.memberships, company_id, &(team_id, profile_id), "Member").cloned()
    }

    async fn list_members(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<Vec<TeamMembership>> {
        let t = self.read()?;
        t.team(company_id, team_id)?;
        Ok(collect_sorted(
            &t.memberships,
            company_id,
            |m| m.team_id == team_id,
            |m| (m.created_at, m.profile_id),
        ))
    }

    async fn remove_member(&self, company_id: CompanyId, team_id: TeamId, profile_id: ProfileId) -> StoreResult<()> {
        let mut t = self.write()?;
        scoped(&t.memberships, company_id, &(team_id, profile_id), "Member")?;
        t.memberships.remove(&(team_id, profile_id));
        Ok(())
    }

    async fn assign_course(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        course_id: CourseId,
        assigned_by: ProfileId,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<(TeamCourseAssignment, Vec<Enrollment>)> {
        let mut t = self.write()?;
        let team = t.team(company_id, team_id)?.clone();
        t.course(company_id, course_id)?;
        if t
            .assignments
            .values()
            .any(|a| a.team_id == team_id && a.course_id == course_id)
        {
            return Err(StoreError::Conflict("Course already assigned to team".into()));
        }

        let assignment = TeamCourseAssignment::new(&team, course_id, assigned_by, due_at, now);
        t.assignments.insert(assignment.id, assignment.clone());

        let members: Vec<ProfileId> = t
            .memberships
            .values()
            .filter(|m| m.team_id == team_id)
            .map(|m| m.profile_id)
            .collect();
        let mut created = Vec::new();
        for profile_id in members {
            let enrollment = Enrollment::new(
                company_id,
                course_id,
                profile_id,
                EnrollmentSource::Team,
                Some(assigned_by),
                now,
            );
            let (enrollment, inserted) = t.enroll_once(enrollment);
            if inserted {
                created.push(enrollment);
            }
        }
        Ok((assignment, created))
    }

    async fn get_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<TeamCourseAssignment> {
        let t = self.read()?;
        scoped(&t.assignments, company_id, &assignment_id, "Assignment")
            .ok()
            .filter(|a| a.team_id == team_id)
            .cloned()
            .ok_or(StoreError::NotFound("Assignment"))
    }

    async fn list_assignments(&self, company_id: CompanyId, team_id: TeamId) -> StoreResult<Vec<TeamCourseAssignment>> {
        let t = self.read()?;
        t.team(company_id, team_id)?;
        Ok(collect_sorted(
            &t.assignments,
            company_id,
            |a| a.team_id == team_id,
            |a| (a.created_at, a.id),
        ))
    }

    async fn remove_assignment(
        &self,
        company_id: CompanyId,
        team_id: TeamId,
        assignment_id: TeamCourseId,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        let matches = scoped(&t.assignments, company_id, &assignment_id, "Assignment")?.team_id == team_id;
        if !matches {
            return Err(StoreError::NotFound("Assignment"));
        }
        t.assignments.remove(&assignment_id);
        Ok(())
    }
}

#[async_trait]
impl QuizStore for InMemoryLearningStore {
    async fn create_quiz(
        &self,
        company_id: CompanyId,
        course_id: CourseId,
        block_id: BlockId,
        draft: QuizDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Quiz> {
        let mut t = self.write()?;
        let block = t.block_of_course(company_id, course_id, block_id)?;
        if t.quizzes.values().any(|q| q.block_id == block_id) {
            return Err(StoreError::Conflict("Block already has a quiz".into()));
        }
        let quiz = Quiz::create(block, draft, now)?;
        t.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Quiz> {
        let t = self.read()?;
        t.quiz(company_id, quiz_id).cloned()
    }

    async fn add_question(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        draft: QuestionDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizQuestion> {
        let mut t = self.write()?;
        let quiz = t.quiz(company_id, quiz_id)?;
        let position = next_position(
            t.questions
                .values()
                .filter(|q| q.quiz_id == quiz_id)
                .map(|q| q.position),
        );
        let question = QuizQuestion::create(quiz, draft, position, now)?;
        t.questions.insert(question.id, question.clone());
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
        let mut t = self.write()?;
        let question = scoped(&t.questions, company_id, &question_id, "Question")?;
        if question.quiz_id != quiz_id {
            return Err(StoreError::NotFound("Question"));
        }
        let position = next_position(
            t.options
                .values()
                .filter(|o| o.question_id == question_id)
                .map(|o| o.position),
        );
        let option = QuizOption::create(question, draft, position, now)?;
        t.options.insert(option.id, option.clone());
        Ok(option)
    }

    async fn list_questions(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizQuestion>> {
        let t = self.read()?;
        t.quiz(company_id, quiz_id)?;
        Ok(collect_sorted(&t.questions, company_id, |q| q.quiz_id == quiz_id, |q| (q.position, q.id)))
    }

    async fn list_options(&self, company_id: CompanyId, quiz_id: QuizId) -> StoreResult<Vec<QuizOption>> {
        let t = self.read()?;
        t.quiz(company_id, quiz_id)?;
        Ok(collect_sorted(
            &t.options,
            company_id,
            |o| o.quiz_id == quiz_id,
            |o| (o.question_id, o.position, o.id),
        ))
    }

    async fn start_attempt(
        &self,
        company_id: CompanyId,
        quiz_id: QuizId,
        profile_id: ProfileId,
        now: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        let mut t = self.write()?;
        let quiz = t.quiz(company_id, quiz_id)?;
        let held = t
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.profile_id == profile_id)
            .map(|a| a.attempt_number);
        let number = admit_attempt(held, quiz.max_attempts)?;
        let attempt = QuizAttempt::start(quiz, profile_id, number, now);
        t.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, company_id: CompanyId, quiz_id: QuizId, attempt_id: AttemptId) -> StoreResult<QuizAttempt> {
        let t = self.read()?;
        scoped(&t.attempts, company_id, &attempt_id, "Attempt")
            .ok()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .ok_or(StoreError::NotFound("Attempt"))
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
        let mut t = self.write()?;
        let passing_score = t.quiz(company_id, quiz_id)?.passing_score;
        let questions = collect_sorted(&t.questions, company_id, |q| q.quiz_id == quiz_id, |q| q.position);
        let options = collect_sorted(&t.options, company_id, |o| o.quiz_id == quiz_id, |o| o.position);

        let attempt = scoped_mut(&mut t.attempts, company_id, &attempt_id, "Attempt")?;
        if attempt.quiz_id != quiz_id || attempt.profile_id != profile_id {
            return Err(StoreError::NotFound("Attempt"));
        }
        attempt.submit(answers, &questions, &options, passing_score, now)?;
        Ok(attempt.clone())
    }

    async fn list_attempts(&self, company_id: CompanyId, quiz_id: QuizId, profile_id: ProfileId) -> StoreResult<Vec<QuizAttempt>> {
        let t = self.read()?;
        t.quiz(company_id, quiz_id)?;
        Ok(collect_sorted(
            &t.attempts,
            company_id,
            |a| a.quiz_id == quiz_id && a.profile_id == profile_id,
            |a| a.attempt_number,
        ))
    }
}

#[async_trait]
impl AttachmentStore for InMemoryLearningStore {
    async fn insert_attachment(&self, attachment: &Attachment) -> StoreResult<()> {
        let mut t = self.write()?;
        let (company_id, course_id) = (attachment.company_id, attachment.course_id);
        t.course(company_id, course_id)?;
        match attachment.target {
            AttachmentTarget::Course => {}
            AttachmentTarget::Chapter(chapter_id) => {
                t.chapter_of_course(company_id, course_id, chapter_id)?;
            }
            AttachmentTarget::Block(block_id) => {
                t.block_of_course(company_id, course_id, block_id)?;
            }
        }
        t.attachments.insert(attachment.id, attachment.clone());
        Ok(())
    }

    async fn list_attachments(&self, company_id: CompanyId, course_id: CourseId) -> StoreResult<Vec<Attachment>> {
        let t = self.read()?;
        t.course(company_id, course_id)?;
        Ok(collect_sorted(
            &t.attachments,
            company_id,
            |a| a.course_id == course_id,
            |a| (a.created_at, a.id),
        ))
    }

    async fn delete_attachment(&self, company_id: CompanyId, course_id: CourseId, attachment_id: AttachmentId) -> StoreResult<()> {
        let mut t = self.write()?;
        let matches = scoped(&t.attachments, company_id, &attachment_id, "Attachment")?.course_id == course_id;
        if !matches {
            return Err(StoreError::NotFound("Attachment"));
        }
        t.attachments.remove(&attachment_id);
        Ok(())
    }
}

#[async_trait]
impl BadgeStore for InMemoryLearningStore {
    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()> {
        let mut t = self.write()?;
        t.badges.insert(badge.id, badge.clone());
        Ok(())
    }

    async fn list_badges(&self, company_id: CompanyId) -> StoreResult<Vec<Badge>> {
        let t = self.read()?;
        let mut badges: Vec<Badge> = t
            .badges
            .values()
            .filter(|b| b.is_visible_to(company_id))
            .cloned()
            .collect();
        badges.sort_by_key(|b| (!b.is_global(), b.name.to_lowercase()));
        Ok(badges)
    }
}
