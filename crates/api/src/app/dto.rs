use serde::{Deserialize, Deserializer};

use adminkit_auth::{
    GrantEntry, ModulePatch, NewModule, NewPermissionDefinition, RolePatch,
};
use adminkit_core::{DepartmentId, ModuleId};

// -------------------------
// Credentials
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

// -------------------------
// Modules
// -------------------------

/// Body of `PUT /api/modules/{id}/`. Absent fields are left alone;
/// `"icon": null` clears the icon and `"parent": null` detaches the module.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateModuleRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    pub path: Option<String>,
    #[serde(default, alias = "parent", deserialize_with = "double_option")]
    pub parent_id: Option<Option<ModuleId>>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<UpdateModuleRequest> for ModulePatch {
    fn from(req: UpdateModuleRequest) -> Self {
        ModulePatch {
            name: req.name,
            icon: req.icon,
            path: req.path,
            parent_id: req.parent_id,
            order: req.order,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateModuleWithPermissionsRequest {
    #[serde(flatten)]
    pub module: NewModule,
    #[serde(default)]
    pub permissions: Vec<NewPermissionDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateModuleWithPermissionsRequest {
    #[serde(flatten)]
    pub module: UpdateModuleRequest,
    /// When present, becomes the module's complete definition set.
    #[serde(default)]
    pub permissions: Option<Vec<NewPermissionDefinition>>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub path: String,
    pub permission: String,
}

// -------------------------
// Roles
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<DepartmentId>>,
    pub is_active: Option<bool>,
}

impl From<UpdateRoleRequest> for RolePatch {
    fn from(req: UpdateRoleRequest) -> Self {
        RolePatch {
            name: req.name,
            description: req.description,
            department: req.department,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceGrantsRequest {
    pub permissions: Vec<GrantEntry>,
}

/// `null` becomes `Some(None)`; a missing field stays `None` via `default`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent() {
        let req: UpdateModuleRequest = serde_json::from_str(r#"{"name":"Staff","parent":null}"#).unwrap();
        let patch = ModulePatch::from(req);
        assert_eq!(patch.name.as_deref(), Some("Staff"));
        assert_eq!(patch.parent_id, Some(None));
        assert_eq!(patch.icon, None);

        let req: UpdateModuleRequest = serde_json::from_str(r#"{"icon":"users"}"#).unwrap();
        assert_eq!(req.icon, Some(Some("users".to_string())));
    }

    #[test]
    fn create_with_permissions_flattens_module_fields() {
        let req: CreateModuleWithPermissionsRequest = serde_json::from_str(
            r#"{"name":"Reports","path":"/reports","order":6,
                "permissions":[{"codename":"view","label":"Can View"},{"codename":"export_csv","category":"action"}]}"#,
        )
        .unwrap();
        assert_eq!(req.module.path, "/reports");
        assert!(req.module.is_active);
        assert_eq!(req.permissions.len(), 2);
        assert_eq!(req.permissions[1].label, "");
    }
}
