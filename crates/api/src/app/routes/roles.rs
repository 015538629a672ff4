use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use adminkit_auth::{Codename, NewRole, RolePatch};
use adminkit_core::RoleId;

use crate::app::dto::{ReplaceGrantsRequest, UpdateRoleRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, paths};
use crate::context::PrincipalContext;

const ASSIGN_PERMISSIONS: &str = "assign_permissions";

pub fn router() -> Router {
    Router::new()
        .route("/api/roles/", get(list_roles).post(create_role))
        .route("/api/roles/:id/", get(get_role).put(update_role).delete(delete_role))
        .route("/api/roles/:id/permissions/", get(role_permissions).post(replace_permissions))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, Codename::VIEW.as_str())?;
    let roles = services.store().list_roles()?;
    Ok((StatusCode::OK, Json(roles)).into_response())
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewRole>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, Codename::ADD.as_str())?;
    let role = services.store().create_role(body)?;
    tracing::info!(role_id = %role.id, by = %principal.user_id(), "role created");
    Ok((StatusCode::CREATED, Json(role)).into_response())
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<RoleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, Codename::VIEW.as_str())?;
    let role = services.store().get_role(id)?;
    Ok((StatusCode::OK, Json(role)).into_response())
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRoleRequest>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, Codename::EDIT.as_str())?;
    let role = services.store().update_role(id, RolePatch::from(body))?;
    Ok((StatusCode::OK, Json(role)).into_response())
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<RoleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, Codename::DELETE.as_str())?;
    services.store().delete_role(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /api/roles/{id}/permissions/ - the role's grant tree for the editor
pub async fn role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<RoleId>,
) -> ApiResult<axum::response::Response> {
    authz::require_any(
        &services,
        &principal,
        &[(paths::ROLES, Codename::VIEW.as_str()), (paths::ROLES, ASSIGN_PERMISSIONS)],
    )?;
    let tree = services.store().role_grant_tree(id)?;
    Ok((StatusCode::OK, Json(tree)).into_response())
}

/// POST /api/roles/{id}/permissions/ - replace, per listed module, the
/// role's whole grant set
pub async fn replace_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<RoleId>,
    Json(body): Json<ReplaceGrantsRequest>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::ROLES, ASSIGN_PERMISSIONS)?;
    services.store().replace_role_grants(id, &body.permissions)?;
    let tree = services.store().role_grant_tree(id)?;
    Ok((StatusCode::OK, Json(tree)).into_response())
}
