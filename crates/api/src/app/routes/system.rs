use std::sync::Arc;

use axum::{Extension, Json, http::StatusCode};

use crate::app::dto::WhoAmIResponse;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::IdentityContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Identity plus its profile, if one exists yet.
pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
) -> ApiResult<Json<WhoAmIResponse>> {
    let profile = services.store().find_profile_by_identity(identity.identity()).await?;
    let company = match &profile {
        Some(p) => Some(services.store().get_company(p.company_id).await?),
        None => None,
    };

    Ok(Json(WhoAmIResponse {
        identity: identity.identity().to_string(),
        email: identity.email().map(str::to_string),
        profile,
        company,
    }))
}
