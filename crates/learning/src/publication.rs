//! Course ↔ chapter publication consistency.
//!
//! A course may stay published only while at least one of its chapters is
//! published. The rule is enforced reactively, when a chapter is unpublished;
//! publishing a course itself has no chapter precondition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Course;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeOutcome {
    /// The course had no published chapter left and was unpublished.
    CourseUnpublished,
    CourseUntouched,
}

/// Re-evaluate a course after one of its chapters was unpublished.
///
/// `remaining_published` counts the course's published chapters *after* the
/// unpublish.
pub fn cascade_after_unpublish(course: &mut Course, remaining_published: usize, now: DateTime<Utc>) -> CascadeOutcome {
    if remaining_published > 0 {
        return CascadeOutcome::CourseUntouched;
    }
    if course.unpublish(now) {
        CascadeOutcome::CourseUnpublished
    } else {
        CascadeOutcome::CourseUntouched
    }
}
