use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use adminkit_auth::{
    AggregatedView, DefinitionPatch, Department, GrantEntry, MenuItem, Module, ModuleGrants, ModulePatch,
    ModuleWithDefinitions, NewDepartment, NewModule, NewPermissionDefinition, NewRole, NewUser, PermissionDefinition,
    Role, RolePatch, User,
};
use adminkit_core::{DomainResult, ModuleId, PermissionId, RoleId, UserId};

/// Everything the console persists: the module catalog with its
/// definitions, roles and their grants, users, departments, and revoked
/// refresh tokens.
///
/// Implementations own the cascade rules: deleting a module drops every
/// grant on it and its children; deleting a role drops its grants and its
/// user assignments.
pub trait ConsoleStore: Send + Sync {
    // Catalog
    fn list_modules(&self) -> DomainResult<Vec<Module>>;
    fn list_all_modules(&self) -> DomainResult<Vec<Module>>;
    fn get_module(&self, id: ModuleId) -> DomainResult<Module>;
    fn create_module(&self, input: NewModule) -> DomainResult<Module>;
    fn update_module(&self, id: ModuleId, patch: ModulePatch) -> DomainResult<Module>;
    /// Returns the ids of every removed module.
    fn delete_module(&self, id: ModuleId) -> DomainResult<Vec<ModuleId>>;

    // Permission definitions
    fn list_definitions(&self, module: ModuleId) -> DomainResult<Vec<PermissionDefinition>>;
    fn add_definition(&self, module: ModuleId, input: NewPermissionDefinition) -> DomainResult<PermissionDefinition>;
    fn update_definition(&self, id: PermissionId, patch: DefinitionPatch) -> DomainResult<PermissionDefinition>;
    fn remove_definition(&self, id: PermissionId) -> DomainResult<PermissionDefinition>;
    fn module_with_definitions(&self, id: ModuleId) -> DomainResult<ModuleWithDefinitions>;
    fn all_with_definitions(&self) -> DomainResult<Vec<ModuleWithDefinitions>>;
    fn create_module_with_definitions(
        &self,
        input: NewModule,
        definitions: Vec<NewPermissionDefinition>,
    ) -> DomainResult<ModuleWithDefinitions>;
    fn update_module_with_definitions(
        &self,
        id: ModuleId,
        patch: ModulePatch,
        definitions: Option<Vec<NewPermissionDefinition>>,
    ) -> DomainResult<ModuleWithDefinitions>;

    // Roles and grants
    fn list_roles(&self) -> DomainResult<Vec<Role>>;
    fn get_role(&self, id: RoleId) -> DomainResult<Role>;
    fn create_role(&self, input: NewRole) -> DomainResult<Role>;
    fn update_role(&self, id: RoleId, patch: RolePatch) -> DomainResult<Role>;
    fn delete_role(&self, id: RoleId) -> DomainResult<()>;
    fn role_grant_tree(&self, role: RoleId) -> DomainResult<Vec<ModuleGrants>>;
    fn replace_role_grants(&self, role: RoleId, entries: &[GrantEntry]) -> DomainResult<()>;

    // Departments
    fn list_departments(&self) -> DomainResult<Vec<Department>>;
    fn create_department(&self, input: NewDepartment) -> DomainResult<Department>;

    // Users
    fn register_user(&self, input: NewUser) -> DomainResult<User>;
    fn get_user(&self, id: UserId) -> DomainResult<User>;
    fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
    fn set_user_roles(&self, id: UserId, roles: Vec<RoleId>) -> DomainResult<User>;
    /// Verify credentials. Unknown users, wrong passwords and inactive
    /// accounts all fail with `Unauthorized`.
    fn authenticate(&self, username: &str, password: &str) -> DomainResult<User>;

    // Principal view
    fn aggregated_view(&self, user: UserId) -> DomainResult<AggregatedView>;
    fn principal_menu(&self, user: UserId) -> DomainResult<Vec<MenuItem>>;

    // Refresh-token revocation. `expires_at` lets the store forget a
    // revocation once the token could no longer be presented anyway.
    fn revoke_refresh_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> DomainResult<()>;
    fn is_refresh_token_revoked(&self, jti: Uuid) -> DomainResult<bool>;
}

macro_rules! forward {
    ($($name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> $ret {
                (**self).$name($($arg),*)
            }
        )*
    };
}

impl<S> ConsoleStore for Arc<S>
where
    S: ConsoleStore + ?Sized,
{
    forward! {
        list_modules(&self) -> DomainResult<Vec<Module>>;
        list_all_modules(&self) -> DomainResult<Vec<Module>>;
        get_module(&self, id: ModuleId) -> DomainResult<Module>;
        create_module(&self, input: NewModule) -> DomainResult<Module>;
        update_module(&self, id: ModuleId, patch: ModulePatch) -> DomainResult<Module>;
        delete_module(&self, id: ModuleId) -> DomainResult<Vec<ModuleId>>;
        list_definitions(&self, module: ModuleId) -> DomainResult<Vec<PermissionDefinition>>;
        add_definition(&self, module: ModuleId, input: NewPermissionDefinition) -> DomainResult<PermissionDefinition>;
        update_definition(&self, id: PermissionId, patch: DefinitionPatch) -> DomainResult<PermissionDefinition>;
        remove_definition(&self, id: PermissionId) -> DomainResult<PermissionDefinition>;
        module_with_definitions(&self, id: ModuleId) -> DomainResult<ModuleWithDefinitions>;
        all_with_definitions(&self) -> DomainResult<Vec<ModuleWithDefinitions>>;
        create_module_with_definitions(&self, input: NewModule, definitions: Vec<NewPermissionDefinition>) -> DomainResult<ModuleWithDefinitions>;
        update_module_with_definitions(&self, id: ModuleId, patch: ModulePatch, definitions: Option<Vec<NewPermissionDefinition>>) -> DomainResult<ModuleWithDefinitions>;
        list_roles(&self) -> DomainResult<Vec<Role>>;
        get_role(&self, id: RoleId) -> DomainResult<Role>;
        create_role(&self, input: NewRole) -> DomainResult<Role>;
        update_role(&self, id: RoleId, patch: RolePatch) -> DomainResult<Role>;
        delete_role(&self, id: RoleId) -> DomainResult<()>;
        role_grant_tree(&self, role: RoleId) -> DomainResult<Vec<ModuleGrants>>;
        replace_role_grants(&self, role: RoleId, entries: &[GrantEntry]) -> DomainResult<()>;
        list_departments(&self) -> DomainResult<Vec<Department>>;
        create_department(&self, input: NewDepartment) -> DomainResult<Department>;
        register_user(&self, input: NewUser) -> DomainResult<User>;
        get_user(&self, id: UserId) -> DomainResult<User>;
        find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
        set_user_roles(&self, id: UserId, roles: Vec<RoleId>) -> DomainResult<User>;
        authenticate(&self, username: &str, password: &str) -> DomainResult<User>;
        aggregated_view(&self, user: UserId) -> DomainResult<AggregatedView>;
        principal_menu(&self, user: UserId) -> DomainResult<Vec<MenuItem>>;
        revoke_refresh_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> DomainResult<()>;
        is_refresh_token_revoked(&self, jti: Uuid) -> DomainResult<bool>;
    }
}
