use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::app::dto::{LoginRequest, RefreshRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Credential exchange; reachable without an access token.
pub fn public_router() -> Router {
    Router::new()
        .route("/api/users/login/", post(login))
        .route("/api/users/token/refresh/", post(refresh))
}

pub fn router() -> Router {
    Router::new()
        .route("/api/users/logout/", post(logout))
        .route("/api/users/profile/", get(profile))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<axum::response::Response> {
    let pair = services.login(body.username.trim().to_string(), body.password).await?;
    Ok((StatusCode::OK, Json(pair)).into_response())
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<axum::response::Response> {
    let access = services.refresh(&body.refresh)?;
    Ok((StatusCode::OK, Json(json!({ "access": access }))).into_response())
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<axum::response::Response> {
    services.logout(principal.user_id(), &body.refresh)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    let user = services.store().get_user(principal.user_id())?;
    Ok((StatusCode::OK, Json(user.profile())).into_response())
}
