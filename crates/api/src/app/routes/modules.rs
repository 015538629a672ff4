use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use adminkit_auth::{Codename, DefinitionPatch, ModulePatch, NewModule, NewPermissionDefinition};
use adminkit_core::{ModuleId, PermissionId};

use crate::app::dto::{CreateModuleWithPermissionsRequest, UpdateModuleRequest, UpdateModuleWithPermissionsRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, paths};
use crate::context::PrincipalContext;

const MANAGE_PERMISSIONS: &str = "manage_permissions";

pub fn router() -> Router {
    Router::new()
        .route("/api/modules/", get(list_modules).post(create_module))
        .route("/api/modules/my-menu/", get(my_menu))
        .route("/api/modules/all-with-permissions/", get(all_with_permissions))
        .route("/api/modules/create-with-permissions/", post(create_with_permissions))
        .route(
            "/api/modules/permissions/:id/",
            put(update_definition).delete(remove_definition),
        )
        .route("/api/modules/:id/", get(get_module).put(update_module).delete(delete_module))
        .route("/api/modules/:id/permissions/", get(list_definitions).post(add_definition))
        .route("/api/modules/:id/with-permissions/", get(with_permissions))
        .route("/api/modules/:id/update-with-permissions/", put(update_with_permissions))
}

/// GET /api/modules/my-menu/ - the caller's role-scoped navigation tree
pub async fn my_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    let menu = services.menu_for(principal.user_id())?;
    Ok((StatusCode::OK, Json(menu)).into_response())
}

/// GET /api/modules/ - every top-level module, active or not
pub async fn list_modules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::VIEW.as_str())?;
    let modules = services.store().list_all_modules()?;
    Ok((StatusCode::OK, Json(modules)).into_response())
}

pub async fn create_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewModule>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::ADD.as_str())?;
    let module = services.store().create_module(body)?;
    Ok((StatusCode::CREATED, Json(module)).into_response())
}

pub async fn get_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::VIEW.as_str())?;
    let module = services.store().get_module(id)?;
    Ok((StatusCode::OK, Json(module)).into_response())
}

pub async fn update_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
    Json(body): Json<UpdateModuleRequest>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::EDIT.as_str())?;
    let module = services.store().update_module(id, ModulePatch::from(body))?;
    Ok((StatusCode::OK, Json(module)).into_response())
}

/// DELETE /api/modules/{id}/ - removes children and every grant on them
pub async fn delete_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::DELETE.as_str())?;
    let removed = services.store().delete_module(id)?;
    Ok((StatusCode::OK, Json(json!({ "deleted": removed }))).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission definitions
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_definitions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::VIEW.as_str())?;
    let definitions = services.store().list_definitions(id)?;
    Ok((StatusCode::OK, Json(definitions)).into_response())
}

pub async fn add_definition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
    Json(body): Json<NewPermissionDefinition>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, MANAGE_PERMISSIONS)?;
    let definition = services.store().add_definition(id, body)?;
    Ok((StatusCode::CREATED, Json(definition)).into_response())
}

pub async fn update_definition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PermissionId>,
    Json(body): Json<DefinitionPatch>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, MANAGE_PERMISSIONS)?;
    let definition = services.store().update_definition(id, body)?;
    Ok((StatusCode::OK, Json(definition)).into_response())
}

pub async fn remove_definition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<PermissionId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, MANAGE_PERMISSIONS)?;
    services.store().remove_definition(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Modules with their definitions
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/modules/all-with-permissions/ - feeds the role permission editor
pub async fn all_with_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authz::require_any(
        &services,
        &principal,
        &[(paths::MODULES, Codename::VIEW.as_str()), (paths::ROLES, "assign_permissions")],
    )?;
    let modules = services.store().all_with_definitions()?;
    Ok((StatusCode::OK, Json(modules)).into_response())
}

pub async fn with_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::MODULES, Codename::VIEW.as_str())?;
    let module = services.store().module_with_definitions(id)?;
    Ok((StatusCode::OK, Json(module)).into_response())
}

pub async fn create_with_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateModuleWithPermissionsRequest>,
) -> ApiResult<axum::response::Response> {
    let menu = authz::require(&services, &principal, paths::MODULES, Codename::ADD.as_str())?;
    if !body.permissions.is_empty() {
        authz::check(&menu, paths::MODULES, MANAGE_PERMISSIONS)?;
    }
    let module = services
        .store()
        .create_module_with_definitions(body.module, body.permissions)?;
    Ok((StatusCode::CREATED, Json(module)).into_response())
}

pub async fn update_with_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ModuleId>,
    Json(body): Json<UpdateModuleWithPermissionsRequest>,
) -> ApiResult<axum::response::Response> {
    let menu = authz::require(&services, &principal, paths::MODULES, Codename::EDIT.as_str())?;
    if body.permissions.is_some() {
        authz::check(&menu, paths::MODULES, MANAGE_PERMISSIONS)?;
    }
    let module = services.store().update_module_with_definitions(
        id,
        ModulePatch::from(body.module),
        body.permissions,
    )?;
    Ok((StatusCode::OK, Json(module)).into_response())
}
