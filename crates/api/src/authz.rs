//! API-side capability guard.
//!
//! Admin endpoints are checked with the same evaluator the console uses:
//! against the caller's freshly derived menu, by module path and codename.

use adminkit_auth::{MenuItem, authorize, explain, has_permission};

use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Module paths the admin endpoints are guarded by.
pub mod paths {
    pub const MODULES: &str = "/modules";
    pub const ROLES: &str = "/roles";
    pub const DEPARTMENTS: &str = "/departments";
}

/// Require `codename` on `path` for the caller. Returns the caller's menu so
/// handlers can run further checks without recomputing it.
pub fn require(
    services: &AppServices,
    principal: &PrincipalContext,
    path: &str,
    codename: &str,
) -> ApiResult<Vec<MenuItem>> {
    let menu = services.menu_for(principal.user_id())?;
    check(&menu, path, codename)?;
    Ok(menu)
}

/// Check one more capability against an already resolved menu.
pub fn check(menu: &[MenuItem], path: &str, codename: &str) -> ApiResult<()> {
    authorize(menu, path, codename).map_err(|_| ApiError::Forbidden(Box::new(explain(menu, path, codename))))
}

/// Like [`require`], but any one of `checks` suffices. The denial explains
/// the first check.
pub fn require_any(
    services: &AppServices,
    principal: &PrincipalContext,
    checks: &[(&str, &str)],
) -> ApiResult<Vec<MenuItem>> {
    let menu = services.menu_for(principal.user_id())?;
    if checks.iter().any(|(path, codename)| has_permission(&menu, path, codename)) {
        return Ok(menu);
    }
    let (path, codename) = checks.first().copied().unwrap_or(("", ""));
    tracing::warn!(user_id = %principal.user_id(), path, codename, "authorization denied");
    Err(ApiError::Forbidden(Box::new(explain(&menu, path, codename))))
}
