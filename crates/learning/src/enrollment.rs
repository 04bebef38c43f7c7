use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{CompanyId, CourseId, DomainError, DomainResult, EnrollmentId, ProfileId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "NOT_STARTED",
            EnrollmentStatus::InProgress => "IN_PROGRESS",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_STARTED" => Some(EnrollmentStatus::NotStarted),
            "IN_PROGRESS" => Some(EnrollmentStatus::InProgress),
            "COMPLETED" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    /// Status implied by a progress percentage.
    pub fn for_progress(progress: u8) -> Self {
        match progress {
            0 => EnrollmentStatus::NotStarted,
            100.. => EnrollmentStatus::Completed,
            _ => EnrollmentStatus::InProgress,
        }
    }
}

/// How the enrollment came to exist.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentSource {
    /// Assigned by a person (or self-enrollment of a course creator).
    Manual,
    /// Created because the learner's team was assigned the course.
    Team,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::Manual => "MANUAL",
            EnrollmentSource::Team => "TEAM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(EnrollmentSource::Manual),
            "TEAM" => Some(EnrollmentSource::Team),
            _ => None,
        }
    }
}

/// Link between a profile and a course. Unique per (course, profile).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub profile_id: ProfileId,
    pub status: EnrollmentStatus,
    pub progress: u8,
    pub source: EnrollmentSource,
    pub assigned_by: Option<ProfileId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(
        company_id: CompanyId,
        course_id: CourseId,
        profile_id: ProfileId,
        source: EnrollmentSource,
        assigned_by: Option<ProfileId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new(),
            company_id,
            course_id,
            profile_id,
            status: EnrollmentStatus::NotStarted,
            progress: 0,
            source,
            assigned_by,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a progress percentage and derive the status from it.
    pub fn record_progress(&mut self, progress: u8, now: DateTime<Utc>) -> DomainResult<()> {
        if progress > 100 {
            return Err(DomainError::validation("Progress must be between 0 and 100"));
        }
        self.progress = progress;
        self.status = EnrollmentStatus::for_progress(progress);
        self.completed_at = match self.status {
            EnrollmentStatus::Completed => self.completed_at.or(Some(now)),
            _ => None,
        };
        self.updated_at = now;
        Ok(())
    }
}

scoped_entity!(Enrollment, EnrollmentId);

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Enrollment {
        Enrollment::new(
            CompanyId::new(),
            CourseId::new(),
            ProfileId::new(),
            EnrollmentSource::Manual,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn new_enrollment_has_not_started() {
        let e = enrollment();
        assert_eq!(e.status, EnrollmentStatus::NotStarted);
        assert_eq!(e.progress, 0);
    }

    #[test]
    fn progress_drives_status() {
        let mut e = enrollment();
        e.record_progress(40, Utc::now()).unwrap();
        assert_eq!(e.status, EnrollmentStatus::InProgress);
        assert!(e.completed_at.is_none());

        e.record_progress(100, Utc::now()).unwrap();
        assert_eq!(e.status, EnrollmentStatus::Completed);
        let completed_at = e.completed_at.unwrap();

        // Re-reporting completion keeps the first completion time.
        e.record_progress(100, Utc::now()).unwrap();
        assert_eq!(e.completed_at, Some(completed_at));
    }

    #[test]
    fn progress_above_hundred_is_rejected() {
        let mut e = enrollment();
        assert!(e.record_progress(101, Utc::now()).is_err());
        assert_eq!(e.progress, 0);
    }

    #[test]
    fn source_serializes_in_screaming_case() {
        let json = serde_json::to_value(EnrollmentSource::Manual).unwrap();
        assert_eq!(json, "MANUAL");
        assert_eq!(EnrollmentSource::parse("TEAM"), Some(EnrollmentSource::Team));
        assert_eq!(EnrollmentStatus::parse(EnrollmentStatus::InProgress.as_str()), Some(EnrollmentStatus::InProgress));
    }
}
