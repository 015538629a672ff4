//! Module Catalog: the registry of addressable application areas and the
//! permissions each one declares.
//!
//! Modules form a shallow tree (a parent with child modules). Records are
//! stored flat and keyed by id; trees are assembled on read, so every
//! returned `Module` is a snapshot and never aliases catalog state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use adminkit_core::{DomainError, DomainResult, Entity, IdSequence, ModuleId, PermissionId};

use crate::permissions::{
    Codename, DefinitionPatch, NewPermissionDefinition, PermissionCategory, PermissionDefinition,
};

/// Path of a pure grouping node (no navigable target).
pub const GROUPING_PATH: &str = "#";

/// An addressable application area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub icon: Option<String>,
    pub path: String,
    pub parent_id: Option<ModuleId>,
    pub order: i32,
    pub is_active: bool,
    #[serde(default)]
    pub children: Vec<Module>,
}

impl Module {
    pub fn is_grouping(&self) -> bool {
        self.path == GROUPING_PATH
    }
}

impl Entity for Module {
    type Id = ModuleId;

    fn id(&self) -> ModuleId {
        self.id
    }
}

/// A module with its permission definitions, children in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleWithDefinitions {
    pub id: ModuleId,
    pub name: String,
    pub icon: Option<String>,
    pub path: String,
    pub parent_id: Option<ModuleId>,
    pub order: i32,
    pub is_active: bool,
    pub available_permissions: Vec<PermissionDefinition>,
    #[serde(default)]
    pub children: Vec<ModuleWithDefinitions>,
}

/// Input for creating a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewModule {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub path: String,
    #[serde(default, alias = "parent")]
    pub parent_id: Option<ModuleId>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NewModule {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            path: path.into(),
            parent_id: None,
            order: 0,
            is_active: true,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn parent(mut self, parent: ModuleId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update of a module.
///
/// `parent_id: Some(None)` detaches a child into a top-level module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePatch {
    pub name: Option<String>,
    pub icon: Option<Option<String>>,
    pub path: Option<String>,
    pub parent_id: Option<Option<ModuleId>>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

/// The catalog itself. Pure data structure; callers provide locking.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: BTreeMap<ModuleId, Module>,
    definitions: BTreeMap<ModuleId, Vec<PermissionDefinition>>,
    module_ids: IdSequence,
    permission_ids: IdSequence,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Active top-level modules with their active children attached,
    /// ordered by `order` then `id` at each level.
    pub fn list_modules(&self) -> Vec<Module> {
        self.top_level(|m| m.is_active)
    }

    /// Every top-level module (active or not) with active children attached.
    /// Used by administration screens that must show disabled entries.
    pub fn list_all_modules(&self) -> Vec<Module> {
        self.top_level(|_| true)
    }

    fn top_level(&self, keep: impl Fn(&Module) -> bool) -> Vec<Module> {
        let mut roots: Vec<Module> = self
            .modules
            .values()
            .filter(|m| m.parent_id.is_none() && keep(m))
            .map(|m| self.with_children(m))
            .collect();
        sort_siblings(&mut roots);
        roots
    }

    fn with_children(&self, module: &Module) -> Module {
        let mut out = module.clone();
        out.children = self.active_children(module.id);
        out
    }

    fn active_children(&self, parent: ModuleId) -> Vec<Module> {
        let mut children: Vec<Module> = self
            .modules
            .values()
            .filter(|m| m.parent_id == Some(parent) && m.is_active)
            .map(|m| self.with_children(m))
            .collect();
        sort_siblings(&mut children);
        children
    }

    /// A module with its active children attached.
    pub fn get_module(&self, id: ModuleId) -> DomainResult<Module> {
        let module = self
            .modules
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("module {id}")))?;
        Ok(self.with_children(module))
    }

    /// The flat record for a module (no children attached).
    pub fn record(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// First active module with the given path.
    pub fn find_by_path(&self, path: &str) -> Option<&Module> {
        self.modules.values().find(|m| m.is_active && m.path == path)
    }

    pub fn create(&mut self, input: NewModule) -> DomainResult<Module> {
        validate_name_and_path(&input.name, &input.path)?;
        if let Some(parent) = input.parent_id {
            if !self.contains(parent) {
                return Err(DomainError::validation(format!("parent module {parent} does not exist")));
            }
        }
        if input.is_active {
            self.ensure_path_free(&input.path, None)?;
        }

        let id: ModuleId = self.module_ids.next();
        let module = Module {
            id,
            name: input.name.trim().to_string(),
            icon: input.icon.filter(|i| !i.trim().is_empty()),
            path: input.path.trim().to_string(),
            parent_id: input.parent_id,
            order: input.order,
            is_active: input.is_active,
            children: Vec::new(),
        };
        self.modules.insert(id, module.clone());
        Ok(module)
    }

    pub fn update(&mut self, id: ModuleId, patch: ModulePatch) -> DomainResult<Module> {
        let current = self
            .modules
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("module {id}")))?;

        let mut next = current;
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(icon) = patch.icon {
            next.icon = icon.filter(|i| !i.trim().is_empty());
        }
        if let Some(path) = patch.path {
            next.path = path.trim().to_string();
        }
        if let Some(order) = patch.order {
            next.order = order;
        }
        if let Some(active) = patch.is_active {
            next.is_active = active;
        }
        if let Some(parent) = patch.parent_id {
            if let Some(parent) = parent {
                if parent == id {
                    return Err(DomainError::validation("a module cannot be its own parent"));
                }
                if !self.contains(parent) {
                    return Err(DomainError::validation(format!("parent module {parent} does not exist")));
                }
                if self.descendants(id).contains(&parent) {
                    return Err(DomainError::validation("a module cannot be moved under its own descendant"));
                }
            }
            next.parent_id = parent;
        }

        validate_name_and_path(&next.name, &next.path)?;
        if next.is_active {
            self.ensure_path_free(&next.path, Some(id))?;
        }

        self.modules.insert(id, next.clone());
        Ok(next)
    }

    /// Delete a module and, transitively, its children together with their
    /// permission definitions. Returns every removed id so dependent state
    /// (grants) can be purged by the caller.
    pub fn delete(&mut self, id: ModuleId) -> DomainResult<Vec<ModuleId>> {
        if !self.contains(id) {
            return Err(DomainError::not_found(format!("module {id}")));
        }
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for module_id in &removed {
            self.modules.remove(module_id);
            self.definitions.remove(module_id);
        }
        Ok(removed)
    }

    fn descendants(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for m in self.modules.values().filter(|m| m.parent_id == Some(current)) {
                if !out.contains(&m.id) && m.id != id {
                    out.push(m.id);
                    frontier.push(m.id);
                }
            }
        }
        out
    }

    fn ensure_path_free(&self, path: &str, except: Option<ModuleId>) -> DomainResult<()> {
        let path = path.trim();
        if path == GROUPING_PATH {
            return Ok(());
        }
        let taken = self
            .modules
            .values()
            .any(|m| m.is_active && m.path == path && Some(m.id) != except);
        if taken {
            return Err(DomainError::validation(format!("path '{path}' is already used by an active module")));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Permission definitions
    // ─────────────────────────────────────────────────────────────────────

    /// Definitions declared on a module, in canonical order.
    pub fn definitions(&self, module: ModuleId) -> DomainResult<&[PermissionDefinition]> {
        if !self.contains(module) {
            return Err(DomainError::not_found(format!("module {module}")));
        }
        Ok(self.definitions.get(&module).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn definition(&self, id: PermissionId) -> Option<&PermissionDefinition> {
        self.definitions.values().flatten().find(|d| d.id == id)
    }

    pub fn has_definition(&self, module: ModuleId, codename: &str) -> bool {
        self.definitions
            .get(&module)
            .is_some_and(|defs| defs.iter().any(|d| d.codename.as_str() == codename))
    }

    pub fn category_of(&self, module: ModuleId, codename: &str) -> Option<PermissionCategory> {
        self.definitions
            .get(&module)?
            .iter()
            .find(|d| d.codename.as_str() == codename)
            .map(|d| d.category)
    }

    /// All codenames a module currently declares.
    pub fn codenames(&self, module: ModuleId) -> BTreeSet<Codename> {
        self.definitions
            .get(&module)
            .map(|defs| defs.iter().map(|d| d.codename.clone()).collect())
            .unwrap_or_default()
    }

    pub fn add_definition(
        &mut self,
        module: ModuleId,
        input: NewPermissionDefinition,
    ) -> DomainResult<PermissionDefinition> {
        if !self.contains(module) {
            return Err(DomainError::not_found(format!("module {module}")));
        }
        input.codename.validate()?;
        if self.has_definition(module, input.codename.as_str()) {
            return Err(DomainError::validation(format!(
                "permission '{}' already exists on module {module}",
                input.codename
            )));
        }

        let defs = self.definitions.entry(module).or_default();
        let order = input.order.unwrap_or(defs.len() as i32 + 1);
        let definition = PermissionDefinition {
            id: self.permission_ids.next(),
            module_id: module,
            codename: input.codename,
            label: label_or_codename(input.label, order),
            category: input.category,
            order,
        };
        defs.push(definition.clone());
        sort_definitions(defs);
        Ok(definition)
    }

    pub fn update_definition(
        &mut self,
        id: PermissionId,
        patch: DefinitionPatch,
    ) -> DomainResult<PermissionDefinition> {
        let defs = self
            .definitions
            .values_mut()
            .find(|defs| defs.iter().any(|d| d.id == id))
            .ok_or_else(|| DomainError::not_found(format!("permission {id}")))?;

        let updated = {
            let def = defs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| DomainError::not_found(format!("permission {id}")))?;
            if let Some(label) = patch.label {
                def.label = label;
            }
            if let Some(category) = patch.category {
                def.category = category;
            }
            if let Some(order) = patch.order {
                def.order = order;
            }
            def.clone()
        };
        sort_definitions(defs);
        Ok(updated)
    }

    /// Remove one definition. Grants naming it are left in place and become
    /// inert: evaluation filters them against the current definitions.
    pub fn remove_definition(&mut self, id: PermissionId) -> DomainResult<PermissionDefinition> {
        for defs in self.definitions.values_mut() {
            if let Some(pos) = defs.iter().position(|d| d.id == id) {
                return Ok(defs.remove(pos));
            }
        }
        Err(DomainError::not_found(format!("permission {id}")))
    }

    /// Make `inputs` the module's complete definition set: codenames not
    /// listed are removed, listed ones are updated in place or appended.
    /// The whole list is validated before anything changes.
    pub fn replace_definitions(
        &mut self,
        module: ModuleId,
        inputs: Vec<NewPermissionDefinition>,
    ) -> DomainResult<Vec<PermissionDefinition>> {
        if !self.contains(module) {
            return Err(DomainError::not_found(format!("module {module}")));
        }
        let mut seen = BTreeSet::new();
        for input in &inputs {
            input.codename.validate()?;
            if !seen.insert(input.codename.as_str()) {
                return Err(DomainError::validation(format!(
                    "duplicate permission '{}' in definition list",
                    input.codename
                )));
            }
        }

        let existing = self.definitions.remove(&module).unwrap_or_default();
        let mut next = Vec::with_capacity(inputs.len());
        for (idx, input) in inputs.into_iter().enumerate() {
            let order = input.order.unwrap_or(idx as i32 + 1);
            let id = existing
                .iter()
                .find(|d| d.codename == input.codename)
                .map(|d| d.id)
                .unwrap_or_else(|| self.permission_ids.next());
            next.push(PermissionDefinition {
                id,
                module_id: module,
                label: label_or_codename(input.label, order),
                codename: input.codename,
                category: input.category,
                order,
            });
        }
        sort_definitions(&mut next);
        self.definitions.insert(module, next.clone());
        Ok(next)
    }

    /// A module (with active children) and every definition on it.
    pub fn with_definitions(&self, id: ModuleId) -> DomainResult<ModuleWithDefinitions> {
        let module = self.get_module(id)?;
        Ok(self.attach_definitions(&module))
    }

    /// Active top-level modules with active children, each carrying its
    /// definitions.
    pub fn all_with_definitions(&self) -> Vec<ModuleWithDefinitions> {
        self.list_modules()
            .iter()
            .map(|m| self.attach_definitions(m))
            .collect()
    }

    fn attach_definitions(&self, module: &Module) -> ModuleWithDefinitions {
        ModuleWithDefinitions {
            id: module.id,
            name: module.name.clone(),
            icon: module.icon.clone(),
            path: module.path.clone(),
            parent_id: module.parent_id,
            order: module.order,
            is_active: module.is_active,
            available_permissions: self.definitions.get(&module.id).cloned().unwrap_or_default(),
            children: module.children.iter().map(|c| self.attach_definitions(c)).collect(),
        }
    }

    /// Create a module together with its definitions. Nothing is kept if the
    /// definitions are rejected.
    pub fn create_with_definitions(
        &mut self,
        input: NewModule,
        definitions: Vec<NewPermissionDefinition>,
    ) -> DomainResult<(Module, Vec<PermissionDefinition>)> {
        let snapshot = self.clone();
        let result = self.create(input).and_then(|module| {
            let defs = self.replace_definitions(module.id, definitions)?;
            Ok((module, defs))
        });
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    /// Update a module and, when `definitions` is given, replace its
    /// definition set. Atomic like [`Catalog::create_with_definitions`].
    pub fn update_with_definitions(
        &mut self,
        id: ModuleId,
        patch: ModulePatch,
        definitions: Option<Vec<NewPermissionDefinition>>,
    ) -> DomainResult<(Module, Vec<PermissionDefinition>)> {
        let snapshot = self.clone();
        let result = self.update(id, patch).and_then(|module| {
            let defs = match definitions {
                Some(defs) => self.replace_definitions(id, defs)?,
                None => self.definitions(id)?.to_vec(),
            };
            Ok((module, defs))
        });
        if result.is_err() {
            *self = snapshot;
        }
        result
    }
}

fn sort_siblings(modules: &mut [Module]) {
    modules.sort_by_key(|m| (m.order, m.id));
}

fn sort_definitions(defs: &mut [PermissionDefinition]) {
    defs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

fn label_or_codename(label: String, order: i32) -> String {
    if label.trim().is_empty() {
        format!("Permission {order}")
    } else {
        label
    }
}

fn validate_name_and_path(name: &str, path: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("module name cannot be empty"));
    }
    if path.trim().is_empty() {
        return Err(DomainError::validation("module path cannot be empty"));
    }
    Ok(())
}
