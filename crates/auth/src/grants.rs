//! Permission Grant Store: `(role, module) -> set<codename>`.
//!
//! Grants are only ever written through [`GrantStore::replace`], which
//! replaces whole per-module sets. Absence of an entry means no permission.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use adminkit_core::{DomainError, DomainResult, ModuleId, RoleId};

use crate::catalog::Catalog;
use crate::permissions::Codename;
use crate::principal::AggregatedView;

/// One module's entry in a replace payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEntry {
    pub module_id: ModuleId,
    #[serde(default)]
    pub granted: Vec<Codename>,
}

impl GrantEntry {
    pub fn new(module_id: ModuleId, granted: impl IntoIterator<Item = impl Into<Codename>>) -> Self {
        Self {
            module_id,
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GrantStore {
    grants: BTreeMap<RoleId, BTreeMap<ModuleId, BTreeSet<Codename>>>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored codenames for one `(role, module)` pair, including any that
    /// no longer have a definition.
    pub fn granted(&self, role: RoleId, module: ModuleId) -> BTreeSet<Codename> {
        self.grants
            .get(&role)
            .and_then(|modules| modules.get(&module))
            .cloned()
            .unwrap_or_default()
    }

    pub fn role_grants(&self, role: RoleId) -> Option<&BTreeMap<ModuleId, BTreeSet<Codename>>> {
        self.grants.get(&role)
    }

    /// Replace, for every module in `entries`, the role's entire grant set
    /// on that module. Modules not mentioned keep their grants.
    ///
    /// The payload is validated whole against the catalog first: an
    /// unknown module, a codename the module does not declare, or a module
    /// listed twice rejects everything and leaves the store untouched.
    pub fn replace(&mut self, role: RoleId, entries: &[GrantEntry], catalog: &Catalog) -> DomainResult<()> {
        let mut seen = BTreeSet::new();
        for entry in entries {
            if !catalog.contains(entry.module_id) {
                return Err(DomainError::validation(format!("unknown module {}", entry.module_id)));
            }
            if !seen.insert(entry.module_id) {
                return Err(DomainError::validation(format!(
                    "module {} listed more than once",
                    entry.module_id
                )));
            }
            for codename in &entry.granted {
                if !catalog.has_definition(entry.module_id, codename.as_str()) {
                    return Err(DomainError::validation(format!(
                        "permission '{codename}' is not defined on module {}",
                        entry.module_id
                    )));
                }
            }
        }

        let modules = self.grants.entry(role).or_default();
        for entry in entries {
            let set: BTreeSet<Codename> = entry.granted.iter().cloned().collect();
            if set.is_empty() {
                modules.remove(&entry.module_id);
            } else {
                modules.insert(entry.module_id, set);
            }
        }
        if modules.is_empty() {
            self.grants.remove(&role);
        }
        Ok(())
    }

    /// Drop every grant that references one of `modules`.
    pub fn purge_modules(&mut self, modules: &[ModuleId]) -> usize {
        let mut removed = 0;
        for per_role in self.grants.values_mut() {
            for module in modules {
                if per_role.remove(module).is_some() {
                    removed += 1;
                }
            }
        }
        self.grants.retain(|_, per_role| !per_role.is_empty());
        removed
    }

    /// Drop all grants owned by a role.
    pub fn purge_role(&mut self, role: RoleId) -> bool {
        self.grants.remove(&role).is_some()
    }

    /// Union of grants across `roles`, filtered through the catalog's
    /// current definitions so stale codenames never match.
    pub fn aggregate(&self, roles: &[RoleId], catalog: &Catalog) -> AggregatedView {
        let mut modules: BTreeMap<ModuleId, BTreeSet<Codename>> = BTreeMap::new();
        for role in roles {
            let Some(per_role) = self.grants.get(role) else {
                continue;
            };
            for (module, codenames) in per_role {
                let live = codenames
                    .iter()
                    .filter(|c| catalog.has_definition(*module, c.as_str()))
                    .cloned();
                modules.entry(*module).or_default().extend(live);
            }
        }
        modules.retain(|_, set| !set.is_empty());

        let mut roles = roles.to_vec();
        roles.sort();
        roles.dedup();
        AggregatedView { roles, modules }
    }
}
