use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use adminkit_auth::explain as explain_decision;

use crate::app::dto::ExplainQuery;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    let user = services.store().get_user(principal.user_id())?;
    Ok(Json(serde_json::json!({
        "user_id": user.id,
        "username": user.username,
        "roles": user.roles,
    }))
    .into_response())
}

/// GET /api/authz/explain?path=/users&permission=edit
///
/// Why the caller would be allowed or denied, evaluated against their
/// current menu.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> ApiResult<axum::response::Response> {
    let menu = services.menu_for(principal.user_id())?;
    let explanation = explain_decision(&menu, &query.path, &query.permission);
    Ok((StatusCode::OK, Json(explanation)).into_response())
}
