use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use adminkit_auth::{
    AggregatedView, Catalog, Codename, DefinitionPatch, Department, GrantEntry, GrantStore, MenuItem, Module,
    ModuleGrants, ModulePatch, ModuleWithDefinitions, NewDepartment, NewModule, NewPermissionDefinition, NewRole,
    NewUser, PermissionDefinition, Role, RolePatch, User, derive_menu,
};
use adminkit_core::{
    DepartmentId, DomainError, DomainResult, IdSequence, ModuleId, PermissionId, RoleId, UserId,
};

use super::console_store::ConsoleStore;

/// Verified against when the username is unknown, so a miss costs the same
/// as a wrong password.
const DUMMY_HASH: &str = "$2b$12$K2CtDP7zMH7VgxScmHTa/.EUm5nd9.xnZM8Cl/p9RMb5QZaJUHgBm";

#[derive(Debug, Default)]
struct ConsoleState {
    catalog: Catalog,
    grants: GrantStore,
    roles: BTreeMap<RoleId, Role>,
    users: BTreeMap<UserId, User>,
    departments: BTreeMap<DepartmentId, Department>,
    role_ids: IdSequence,
    user_ids: IdSequence,
    department_ids: IdSequence,
    /// Revoked refresh-token ids and when each token would have expired.
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl ConsoleState {
    fn role(&self, id: RoleId) -> DomainResult<&Role> {
        self.roles
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("role {id}")))
    }

    fn user(&self, id: UserId) -> DomainResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("user {id}")))
    }

    fn ensure_department(&self, department: Option<DepartmentId>) -> DomainResult<()> {
        match department {
            Some(id) if !self.departments.contains_key(&id) => {
                Err(DomainError::validation(format!("department {id} does not exist")))
            }
            _ => Ok(()),
        }
    }

    fn ensure_roles(&self, roles: &[RoleId]) -> DomainResult<()> {
        match roles.iter().find(|r| !self.roles.contains_key(r)) {
            Some(missing) => Err(DomainError::validation(format!("role {missing} does not exist"))),
            None => Ok(()),
        }
    }

    fn ensure_role_name_free(&self, candidate: &Role) -> DomainResult<()> {
        let taken = self.roles.values().any(|r| {
            r.id != candidate.id && r.department == candidate.department && r.name.eq_ignore_ascii_case(&candidate.name)
        });
        if taken {
            return Err(DomainError::validation(format!(
                "a role named '{}' already exists in this department",
                candidate.name
            )));
        }
        Ok(())
    }

    fn module_grants(&self, role: RoleId, module: &Module) -> DomainResult<ModuleGrants> {
        let available = self.catalog.definitions(module.id)?.to_vec();
        let live = self.catalog.codenames(module.id);
        let granted: BTreeSet<Codename> = self
            .grants
            .granted(role, module.id)
            .into_iter()
            .filter(|c| live.contains(c))
            .collect();
        let children = module
            .children
            .iter()
            .map(|child| self.module_grants(role, child))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(ModuleGrants {
            module_id: module.id,
            module_name: module.name.clone(),
            available_permissions: available,
            granted_permissions: granted,
            children,
        })
    }

    fn aggregated_view(&self, user: UserId) -> DomainResult<AggregatedView> {
        let user = self.user(user)?;
        let active: Vec<RoleId> = user
            .roles
            .iter()
            .copied()
            .filter(|r| self.roles.get(r).is_some_and(|role| role.is_active))
            .collect();
        Ok(self.grants.aggregate(&active, &self.catalog))
    }
}

/// In-memory console store.
///
/// Intended for tests/dev and the demo server. One lock guards the whole
/// state so cascades (module delete, role delete) are atomic.
#[derive(Debug)]
pub struct InMemoryConsoleStore {
    state: RwLock<ConsoleState>,
    bcrypt_cost: u32,
}

impl Default for InMemoryConsoleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConsoleStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConsoleState::default()),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt work factor. Tests use the minimum (4).
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, ConsoleState>> {
        self.state
            .read()
            .map_err(|_| DomainError::invariant("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, ConsoleState>> {
        self.state
            .write()
            .map_err(|_| DomainError::invariant("lock poisoned"))
    }
}

impl ConsoleStore for InMemoryConsoleStore {
    // ─────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────

    fn list_modules(&self) -> DomainResult<Vec<Module>> {
        Ok(self.read()?.catalog.list_modules())
    }

    fn list_all_modules(&self) -> DomainResult<Vec<Module>> {
        Ok(self.read()?.catalog.list_all_modules())
    }

    fn get_module(&self, id: ModuleId) -> DomainResult<Module> {
        self.read()?.catalog.get_module(id)
    }

    fn create_module(&self, input: NewModule) -> DomainResult<Module> {
        let module = self.write()?.catalog.create(input)?;
        tracing::info!(module_id = %module.id, path = %module.path, "module created");
        Ok(module)
    }

    fn update_module(&self, id: ModuleId, patch: ModulePatch) -> DomainResult<Module> {
        self.write()?.catalog.update(id, patch)
    }

    fn delete_module(&self, id: ModuleId) -> DomainResult<Vec<ModuleId>> {
        let mut state = self.write()?;
        let removed = state.catalog.delete(id)?;
        let purged = state.grants.purge_modules(&removed);
        tracing::info!(module_id = %id, modules = removed.len(), grants = purged, "module deleted");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Permission definitions
    // ─────────────────────────────────────────────────────────────────────

    fn list_definitions(&self, module: ModuleId) -> DomainResult<Vec<PermissionDefinition>> {
        Ok(self.read()?.catalog.definitions(module)?.to_vec())
    }

    fn add_definition(&self, module: ModuleId, input: NewPermissionDefinition) -> DomainResult<PermissionDefinition> {
        self.write()?.catalog.add_definition(module, input)
    }

    fn update_definition(&self, id: PermissionId, patch: DefinitionPatch) -> DomainResult<PermissionDefinition> {
        self.write()?.catalog.update_definition(id, patch)
    }

    fn remove_definition(&self, id: PermissionId) -> DomainResult<PermissionDefinition> {
        let removed = self.write()?.catalog.remove_definition(id)?;
        tracing::debug!(permission_id = %id, codename = %removed.codename, "permission definition removed");
        Ok(removed)
    }

    fn module_with_definitions(&self, id: ModuleId) -> DomainResult<ModuleWithDefinitions> {
        self.read()?.catalog.with_definitions(id)
    }

    fn all_with_definitions(&self) -> DomainResult<Vec<ModuleWithDefinitions>> {
        Ok(self.read()?.catalog.all_with_definitions())
    }

    fn create_module_with_definitions(
        &self,
        input: NewModule,
        definitions: Vec<NewPermissionDefinition>,
    ) -> DomainResult<ModuleWithDefinitions> {
        let mut state = self.write()?;
        let (module, _) = state.catalog.create_with_definitions(input, definitions)?;
        tracing::info!(module_id = %module.id, path = %module.path, "module created");
        state.catalog.with_definitions(module.id)
    }

    fn update_module_with_definitions(
        &self,
        id: ModuleId,
        patch: ModulePatch,
        definitions: Option<Vec<NewPermissionDefinition>>,
    ) -> DomainResult<ModuleWithDefinitions> {
        let mut state = self.write()?;
        state.catalog.update_with_definitions(id, patch, definitions)?;
        state.catalog.with_definitions(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Roles and grants
    // ─────────────────────────────────────────────────────────────────────

    fn list_roles(&self) -> DomainResult<Vec<Role>> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    fn get_role(&self, id: RoleId) -> DomainResult<Role> {
        self.read()?.role(id).cloned()
    }

    fn create_role(&self, input: NewRole) -> DomainResult<Role> {
        input.validate()?;
        let mut state = self.write()?;
        state.ensure_department(input.department)?;
        let id: RoleId = state.role_ids.next();
        let role = input.into_role(id);
        state.ensure_role_name_free(&role)?;
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    fn update_role(&self, id: RoleId, patch: RolePatch) -> DomainResult<Role> {
        let mut state = self.write()?;
        let next = patch.apply(state.role(id)?)?;
        state.ensure_department(next.department)?;
        state.ensure_role_name_free(&next)?;
        state.roles.insert(id, next.clone());
        Ok(next)
    }

    fn delete_role(&self, id: RoleId) -> DomainResult<()> {
        let mut state = self.write()?;
        state.role(id)?;
        state.roles.remove(&id);
        state.grants.purge_role(id);
        for user in state.users.values_mut() {
            user.roles.retain(|r| *r != id);
        }
        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    fn role_grant_tree(&self, role: RoleId) -> DomainResult<Vec<ModuleGrants>> {
        let state = self.read()?;
        state.role(role)?;
        state
            .catalog
            .list_modules()
            .iter()
            .map(|module| state.module_grants(role, module))
            .collect()
    }

    fn replace_role_grants(&self, role: RoleId, entries: &[GrantEntry]) -> DomainResult<()> {
        let mut state = self.write()?;
        state.role(role)?;
        let ConsoleState { catalog, grants, .. } = &mut *state;
        grants.replace(role, entries, catalog)?;
        tracing::info!(role_id = %role, modules = entries.len(), "role grants replaced");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Departments
    // ─────────────────────────────────────────────────────────────────────

    fn list_departments(&self) -> DomainResult<Vec<Department>> {
        Ok(self.read()?.departments.values().cloned().collect())
    }

    fn create_department(&self, input: NewDepartment) -> DomainResult<Department> {
        input.validate()?;
        let mut state = self.write()?;
        let code = input.code.trim().to_uppercase();
        if state.departments.values().any(|d| d.code == code) {
            return Err(DomainError::conflict(format!("department code '{code}' is taken")));
        }
        let department = Department {
            id: state.department_ids.next(),
            name: input.name.trim().to_string(),
            code,
            description: input.description,
            is_active: true,
        };
        state.departments.insert(department.id, department.clone());
        Ok(department)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    fn register_user(&self, input: NewUser) -> DomainResult<User> {
        input.validate()?;
        // Hashed outside the lock.
        let hash = bcrypt::hash(&input.password, self.bcrypt_cost)
            .map_err(|e| DomainError::invariant(format!("password hashing failed: {e}")))?;

        let mut state = self.write()?;
        if state.users.values().any(|u| u.username == input.username.trim()) {
            return Err(DomainError::conflict(format!("username '{}' is taken", input.username.trim())));
        }
        state.ensure_department(input.department)?;
        state.ensure_roles(&input.roles)?;

        let id: UserId = state.user_ids.next();
        let user = input.into_user(id, hash);
        state.users.insert(id, user.clone());
        tracing::info!(user_id = %id, username = %user.username, "user registered");
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> DomainResult<User> {
        self.read()?.user(id).cloned()
    }

    fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn set_user_roles(&self, id: UserId, roles: Vec<RoleId>) -> DomainResult<User> {
        let mut state = self.write()?;
        state.ensure_roles(&roles)?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("user {id}")))?;
        let mut roles = roles;
        roles.sort();
        roles.dedup();
        user.roles = roles;
        Ok(user.clone())
    }

    fn authenticate(&self, username: &str, password: &str) -> DomainResult<User> {
        let user = self.find_by_username(username)?;
        let Some(user) = user else {
            let _ = bcrypt::verify(password, DUMMY_HASH);
            tracing::warn!(username, "login attempt for unknown user");
            return Err(DomainError::Unauthorized);
        };

        let matches = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
        if !matches {
            tracing::warn!(user_id = %user.id, "login attempt with wrong password");
            return Err(DomainError::Unauthorized);
        }
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "login attempt for inactive user");
            return Err(DomainError::Unauthorized);
        }
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Principal view
    // ─────────────────────────────────────────────────────────────────────

    fn aggregated_view(&self, user: UserId) -> DomainResult<AggregatedView> {
        self.read()?.aggregated_view(user)
    }

    fn principal_menu(&self, user: UserId) -> DomainResult<Vec<MenuItem>> {
        let state = self.read()?;
        let view = state.aggregated_view(user)?;
        Ok(derive_menu(&state.catalog.list_modules(), &view))
    }

    fn revoke_refresh_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> DomainResult<()> {
        let now = Utc::now();
        let mut state = self.write()?;
        let before = state.revoked.len();
        state.revoked.retain(|_, expiry| *expiry > now);
        let pruned = before - state.revoked.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired revocations dropped");
        }
        if expires_at > now {
            state.revoked.insert(jti, expires_at);
        }
        Ok(())
    }

    fn is_refresh_token_revoked(&self, jti: Uuid) -> DomainResult<bool> {
        Ok(self.read()?.revoked.contains_key(&jti))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use adminkit_auth::{PermissionCategory, has_permission};

    use super::*;

    fn store() -> InMemoryConsoleStore {
        InMemoryConsoleStore::new().with_bcrypt_cost(4)
    }

    fn module_with_crud(store: &InMemoryConsoleStore, name: &str, path: &str) -> ModuleId {
        store
            .create_module_with_definitions(NewModule::new(name, path), NewPermissionDefinition::default_crud())
            .unwrap()
            .id
    }

    #[test]
    fn deleting_a_module_purges_grants_on_it_and_its_children() {
        let store = store();
        let users = module_with_crud(&store, "Users", "/users");
        let export = store
            .create_module_with_definitions(
                NewModule::new("Export", "/users/export").parent(users),
                vec![NewPermissionDefinition::new("export_csv", "Export CSV", PermissionCategory::Action)],
            )
            .unwrap()
            .id;
        let role = store.create_role(NewRole::new("Ops")).unwrap();
        store
            .replace_role_grants(
                role.id,
                &[GrantEntry::new(users, ["view"]), GrantEntry::new(export, ["export_csv"])],
            )
            .unwrap();

        let removed = store.delete_module(users).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(store.role_grant_tree(role.id).unwrap().is_empty());

        // A new module never inherits grants from a deleted one.
        let again = module_with_crud(&store, "Users", "/users");
        assert_ne!(again, users);
        let user = store
            .register_user(NewUser::new("ops", "ops@example.com", "pw").roles([role.id]))
            .unwrap();
        assert!(store.principal_menu(user.id).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_role_clears_assignments_and_grants() {
        let store = store();
        let users = module_with_crud(&store, "Users", "/users");
        let role = store.create_role(NewRole::new("Temp")).unwrap();
        store.replace_role_grants(role.id, &[GrantEntry::new(users, ["view"])]).unwrap();
        let user = store
            .register_user(NewUser::new("temp", "temp@example.com", "pw").roles([role.id]))
            .unwrap();

        store.delete_role(role.id).unwrap();
        assert!(store.get_user(user.id).unwrap().roles.is_empty());
        assert!(store.aggregated_view(user.id).unwrap().is_empty());
        assert!(matches!(store.get_role(role.id), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn role_names_are_unique_per_department() {
        let store = store();
        let it = store.create_department(NewDepartment::new("IT", "it")).unwrap();
        let hr = store.create_department(NewDepartment::new("HR", "HR")).unwrap();
        assert_eq!(it.code, "IT");

        store.create_role(NewRole::new("Manager").department(it.id)).unwrap();
        store.create_role(NewRole::new("Manager").department(hr.id)).unwrap();
        let dup = store.create_role(NewRole::new("manager").department(it.id));
        assert!(matches!(dup, Err(DomainError::Validation(_))));

        let missing = store.create_role(NewRole::new("Ghost").department(DepartmentId::new(99)));
        assert!(matches!(missing, Err(DomainError::Validation(_))));
    }

    #[test]
    fn role_grant_tree_hides_stale_codenames() {
        let store = store();
        let users = module_with_crud(&store, "Users", "/users");
        let salary = store
            .add_definition(users, NewPermissionDefinition::new("view_salary", "Salary", PermissionCategory::Column))
            .unwrap();
        let role = store.create_role(NewRole::new("HR")).unwrap();
        store
            .replace_role_grants(role.id, &[GrantEntry::new(users, ["view", "view_salary"])])
            .unwrap();

        store.remove_definition(salary.id).unwrap();
        let tree = store.role_grant_tree(role.id).unwrap();
        assert_eq!(tree.len(), 1);
        let granted: Vec<_> = tree[0].granted_permissions.iter().map(Codename::as_str).collect();
        assert_eq!(granted, vec!["view"]);
        assert_eq!(tree[0].available_permissions.len(), 4);

        assert!(matches!(store.role_grant_tree(RoleId::new(42)), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn replacing_grants_for_unknown_role_is_not_found() {
        let store = store();
        let users = module_with_crud(&store, "Users", "/users");
        let err = store.replace_role_grants(RoleId::new(5), &[GrantEntry::new(users, ["view"])]);
        assert!(matches!(err, Err(DomainError::NotFound(_))));
    }

    #[test]
    fn authenticate_checks_password_and_active_flag() {
        let store = store();
        let user = store.register_user(NewUser::new("amy", "amy@example.com", "Test@1234")).unwrap();
        assert_ne!(user.password_hash, "Test@1234");

        assert_eq!(store.authenticate("amy", "Test@1234").unwrap().id, user.id);
        assert_eq!(store.authenticate("amy", "wrong"), Err(DomainError::Unauthorized));
        assert_eq!(store.authenticate("nobody", "Test@1234"), Err(DomainError::Unauthorized));

        let dup = store.register_user(NewUser::new("amy", "other@example.com", "pw"));
        assert!(matches!(dup, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn inactive_roles_do_not_contribute() {
        let store = store();
        let users = module_with_crud(&store, "Users", "/users");
        let reader = store.create_role(NewRole::new("Reader")).unwrap();
        let writer = store.create_role(NewRole::new("Writer")).unwrap();
        store.replace_role_grants(reader.id, &[GrantEntry::new(users, ["view"])]).unwrap();
        store.replace_role_grants(writer.id, &[GrantEntry::new(users, ["edit"])]).unwrap();
        let user = store
            .register_user(NewUser::new("kim", "kim@example.com", "pw").roles([reader.id, writer.id]))
            .unwrap();

        let menu = store.principal_menu(user.id).unwrap();
        assert!(has_permission(&menu, "/users", "edit"));

        store
            .update_role(writer.id, RolePatch { is_active: Some(false), ..Default::default() })
            .unwrap();
        let menu = store.principal_menu(user.id).unwrap();
        assert!(has_permission(&menu, "/users", "view"));
        assert!(!has_permission(&menu, "/users", "edit"));
    }

    #[test]
    fn set_user_roles_rejects_unknown_roles() {
        let store = store();
        let user = store.register_user(NewUser::new("lee", "lee@example.com", "pw")).unwrap();
        let err = store.set_user_roles(user.id, vec![RoleId::new(77)]);
        assert!(matches!(err, Err(DomainError::Validation(_))));
        assert!(store.get_user(user.id).unwrap().roles.is_empty());
    }

    #[test]
    fn revoked_tokens_are_remembered() {
        let store = store();
        let jti = Uuid::now_v7();
        assert!(!store.is_refresh_token_revoked(jti).unwrap());
        store.revoke_refresh_token(jti, Utc::now() + Duration::hours(1)).unwrap();
        assert!(store.is_refresh_token_revoked(jti).unwrap());
    }

    #[test]
    fn expired_revocations_are_pruned() {
        let store = store();
        let stale = Uuid::now_v7();
        let live = Uuid::now_v7();
        store.state.write().unwrap().revoked.insert(stale, Utc::now() - Duration::minutes(1));

        store.revoke_refresh_token(live, Utc::now() + Duration::hours(1)).unwrap();
        {
            let state = store.state.read().unwrap();
            assert_eq!(state.revoked.len(), 1);
            assert!(state.revoked.contains_key(&live));
        }

        // Already expired: nothing to remember.
        store.revoke_refresh_token(Uuid::now_v7(), Utc::now() - Duration::seconds(1)).unwrap();
        assert_eq!(store.state.read().unwrap().revoked.len(), 1);
    }
}
