use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use learnhub_auth::Action;
use learnhub_core::{AttemptId, BlockId, CourseId, QuestionId, QuizId};
use learnhub_learning::{OptionDraft, QuestionDraft, Quiz, QuizAttempt, QuizDraft, QuizOption, QuizQuestion};

use crate::app::dto::{QuizView, SubmitAttemptRequest, quiz_view};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::{Ids, JsonBody};
use crate::app::routes::common::{editable_course, visible_course};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/blocks/:block_id/quiz", post(create_quiz))
        .route("/quizzes/:quiz_id", get(get_quiz))
        .route("/quizzes/:quiz_id/questions", post(add_question))
        .route("/quizzes/:quiz_id/questions/:question_id/options", post(add_option))
        .route("/quizzes/:quiz_id/attempts", get(list_attempts).post(start_attempt))
        .route("/quizzes/:quiz_id/attempts/:attempt_id", get(get_attempt))
        .route("/quizzes/:quiz_id/attempts/:attempt_id/submit", post(submit_attempt))
}

/// Quiz the caller may edit, checked through its course.
async fn editable_quiz(services: &AppServices, ctx: &RequestContext, quiz_id: QuizId) -> ApiResult<Quiz> {
    let quiz = services.store().get_quiz(ctx.company_id(), quiz_id).await?;
    editable_course(services, ctx, quiz.course_id).await?;
    Ok(quiz)
}

pub async fn create_quiz(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((course_id, block_id)): Ids<(CourseId, BlockId)>,
    JsonBody(draft): JsonBody<QuizDraft>,
) -> ApiResult<(StatusCode, Json<Quiz>)> {
    editable_course(&services, &ctx, course_id).await?;
    let quiz = services
        .workflows()
        .create_quiz(ctx.company_id(), course_id, block_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Answer keys are included only for callers who may edit the course.
pub async fn get_quiz(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(quiz_id): Ids<QuizId>,
) -> ApiResult<Json<QuizView>> {
    let store = services.store();
    let quiz = store.get_quiz(ctx.company_id(), quiz_id).await?;
    let course = visible_course(&services, &ctx, quiz.course_id).await?;
    let reveal = authz::require_course_editor(&ctx, &course).is_ok();

    let questions = store.list_questions(ctx.company_id(), quiz_id).await?;
    let options = store.list_options(ctx.company_id(), quiz_id).await?;
    Ok(Json(quiz_view(quiz, questions, options, reveal)))
}

pub async fn add_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(quiz_id): Ids<QuizId>,
    JsonBody(draft): JsonBody<QuestionDraft>,
) -> ApiResult<(StatusCode, Json<QuizQuestion>)> {
    editable_quiz(&services, &ctx, quiz_id).await?;
    let question = services
        .workflows()
        .add_question(ctx.company_id(), quiz_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn add_option(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((quiz_id, question_id)): Ids<(QuizId, QuestionId)>,
    JsonBody(draft): JsonBody<OptionDraft>,
) -> ApiResult<(StatusCode, Json<QuizOption>)> {
    editable_quiz(&services, &ctx, quiz_id).await?;
    let option = services
        .workflows()
        .add_option(ctx.company_id(), quiz_id, question_id, draft, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(option)))
}

/// Fails with `Max attempts reached` once the quiz's limit is used up.
pub async fn start_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(quiz_id): Ids<QuizId>,
) -> ApiResult<(StatusCode, Json<QuizAttempt>)> {
    authz::require(&ctx, Action::TakeQuiz)?;
    let quiz = services.store().get_quiz(ctx.company_id(), quiz_id).await?;
    visible_course(&services, &ctx, quiz.course_id).await?;

    let attempt = services
        .workflows()
        .start_attempt(&ctx.actor(), quiz_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// The caller's own attempts, oldest first.
pub async fn list_attempts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids(quiz_id): Ids<QuizId>,
) -> ApiResult<Json<Vec<QuizAttempt>>> {
    Ok(Json(
        services
            .store()
            .list_attempts(ctx.company_id(), quiz_id, ctx.profile_id())
            .await?,
    ))
}

pub async fn get_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((quiz_id, attempt_id)): Ids<(QuizId, AttemptId)>,
) -> ApiResult<Json<QuizAttempt>> {
    let attempt = services
        .store()
        .get_attempt(ctx.company_id(), quiz_id, attempt_id)
        .await?;
    if attempt.profile_id != ctx.profile_id() {
        return Err(ApiError::NotFound("Attempt"));
    }
    Ok(Json(attempt))
}

pub async fn submit_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Ids((quiz_id, attempt_id)): Ids<(QuizId, AttemptId)>,
    JsonBody(body): JsonBody<SubmitAttemptRequest>,
) -> ApiResult<Json<QuizAttempt>> {
    authz::require(&ctx, Action::TakeQuiz)?;
    let attempt = services
        .workflows()
        .submit_attempt(&ctx.actor(), quiz_id, attempt_id, body.answers, Utc::now())
        .await?;
    Ok(Json(attempt))
}
