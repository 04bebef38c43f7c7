//! Keeps the flat chapter list in step with the module/lesson/block curriculum.
//!
//! Courses authored through the curriculum API still expose chapters to older
//! clients. On course publish, each module is mirrored into a chapter tagged
//! with `source_module_id`. Running the sync again changes nothing unless a
//! module was added or renamed.

use chrono::{DateTime, Utc};

use learnhub_core::DomainResult;
use learnhub_learning::{Chapter, ChapterDraft, Course, CourseModule, next_position};

/// Plans the chapter writes that bring `chapters` in line with `modules`.
///
/// Implementations are pure; the store applies the returned chapters
/// (inserts and updates) inside the publish operation.
pub trait LegacyChapterSync: Send + Sync {
    fn plan(
        &self,
        course: &Course,
        modules: &[CourseModule],
        chapters: &[Chapter],
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Chapter>>;
}

/// Default sync: one chapter per module, appended after existing chapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleMirrorSync;

impl LegacyChapterSync for ModuleMirrorSync {
    fn plan(
        &self,
        course: &Course,
        modules: &[CourseModule],
        chapters: &[Chapter],
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Chapter>> {
        let mut ordered: Vec<&CourseModule> = modules.iter().filter(|m| m.course_id == course.id).collect();
        ordered.sort_by_key(|m| m.position);

        let mut next = next_position(chapters.iter().map(|c| c.position));
        let mut writes = Vec::new();

        for module in ordered {
            match chapters.iter().find(|c| c.source_module_id == Some(module.id)) {
                Some(mirror) => {
                    if mirror.title != module.title || mirror.description != module.description {
                        let mut updated = mirror.clone();
                        updated.title = module.title.clone();
                        updated.description = module.description.clone();
                        updated.updated_at = now;
                        writes.push(updated);
                    }
                }
                None => {
                    let draft = ChapterDraft {
                        title: module.title.clone(),
                        description: module.description.clone(),
                        ..Default::default()
                    };
                    let mut chapter = Chapter::create(course, draft, next, now)?;
                    chapter.source_module_id = Some(module.id);
                    writes.push(chapter);
                    next += 1;
                }
            }
        }

        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_core::{CompanyId, ProfileId};
    use learnhub_learning::{CourseDraft, ModuleDraft};

    fn course() -> Course {
        Course::create(
            CompanyId::new(),
            ProfileId::new(),
            CourseDraft {
                title: "Safety".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn module(course: &Course, title: &str, position: i32) -> CourseModule {
        CourseModule::create(
            course,
            ModuleDraft {
                title: title.into(),
                description: Some(format!("{title} overview")),
            },
            position,
            Utc::now(),
        )
        .unwrap()
    }

    /// Apply writes the way a store would: replace by id, insert otherwise.
    fn apply(chapters: &mut Vec<Chapter>, writes: Vec<Chapter>) {
        for w in writes {
            match chapters.iter_mut().find(|c| c.id == w.id) {
                Some(existing) => *existing = w,
                None => chapters.push(w),
            }
        }
    }

    #[test]
    fn modules_are_appended_after_existing_chapters() {
        let course = course();
        let manual = Chapter::create(
            &course,
            ChapterDraft {
                title: "Intro".into(),
                ..Default::default()
            },
            1,
            Utc::now(),
        )
        .unwrap();
        let modules = vec![module(&course, "Second", 2), module(&course, "First", 1)];

        let writes = ModuleMirrorSync.plan(&course, &modules, &[manual], Utc::now()).unwrap();

        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].title, "First");
        assert_eq!(writes[0].position, 2);
        assert_eq!(writes[1].title, "Second");
        assert_eq!(writes[1].position, 3);
        assert!(writes.iter().all(|c| !c.is_published && c.source_module_id.is_some()));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let course = course();
        let modules = vec![module(&course, "Basics", 1)];
        let mut chapters = Vec::new();

        let first = ModuleMirrorSync.plan(&course, &modules, &chapters, Utc::now()).unwrap();
        apply(&mut chapters, first);
        let second = ModuleMirrorSync.plan(&course, &modules, &chapters, Utc::now()).unwrap();

        assert!(second.is_empty());
        assert_eq!(chapters.len(), 1);
    }

    #[test]
    fn renamed_module_refreshes_its_mirror() {
        let course = course();
        let mut modules = vec![module(&course, "Basics", 1)];
        let mut chapters = Vec::new();
        let first = ModuleMirrorSync.plan(&course, &modules, &chapters, Utc::now()).unwrap();
        apply(&mut chapters, first);

        modules[0].title = "Fundamentals".into();
        let writes = ModuleMirrorSync.plan(&course, &modules, &chapters, Utc::now()).unwrap();

        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].id, chapters[0].id);
        assert_eq!(writes[0].title, "Fundamentals");
        assert_eq!(writes[0].position, chapters[0].position);
    }
}
