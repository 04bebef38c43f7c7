use axum::Router;

pub mod attachments;
pub mod badges;
pub mod chapters;
pub mod common;
pub mod courses;
pub mod curriculum;
pub mod enrollments;
pub mod onboarding;
pub mod profiles;
pub mod quizzes;
pub mod system;
pub mod teams;

/// Router for all tenant-scoped endpoints (profile required).
pub fn router() -> Router {
    Router::new()
        .merge(profiles::router())
        .merge(badges::router())
        .merge(courses::router())
        .merge(chapters::router())
        .merge(curriculum::router())
        .merge(attachments::router())
        .merge(enrollments::router())
        .merge(teams::router())
        .merge(quizzes::router())
}
