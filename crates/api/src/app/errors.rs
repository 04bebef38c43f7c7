use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use learnhub_auth::AuthzError;
use learnhub_core::DomainError;
use learnhub_infra::StoreError;
use learnhub_observability::INTERNAL_TARGET;

/// HTTP boundary error. Bodies are plain text; the status carries the meaning.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Internal Error")]
    Unexpected(#[source] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Unexpected(err) = &self {
            tracing::error!(target: INTERNAL_TARGET, error = ?err, "unexpected error");
        }
        (self.status(), self.to_string()).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::InvalidInput(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Domain(err) => err.into(),
            StoreError::Conflict(msg) => ApiError::InvalidInput(msg),
            err @ StoreError::Backend(_) => ApiError::Unexpected(err.into()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        tracing::debug!(reason = %value, "authorization denied");
        ApiError::Forbidden
    }
}
