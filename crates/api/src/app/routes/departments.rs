use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use adminkit_auth::{Codename, NewDepartment};

use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, paths};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/api/departments/", get(list_departments).post(create_department))
}

pub async fn list_departments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::DEPARTMENTS, Codename::VIEW.as_str())?;
    let departments = services.store().list_departments()?;
    Ok((StatusCode::OK, Json(departments)).into_response())
}

pub async fn create_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewDepartment>,
) -> ApiResult<axum::response::Response> {
    authz::require(&services, &principal, paths::DEPARTMENTS, Codename::ADD.as_str())?;
    let department = services.store().create_department(body)?;
    Ok((StatusCode::CREATED, Json(department)).into_response())
}
