//! Permission Editor: an in-memory working copy of one role's grants.
//!
//! Every mutation is a pure transform that returns a new working copy; the
//! editor applies them in the order they are issued. Nothing reaches the
//! backend until [`PermissionEditor::save`], which replaces each module's
//! grant set in a single call.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use adminkit_core::{ModuleId, RoleId};

use crate::grants::GrantEntry;
use crate::permissions::{Codename, PermissionCategory, PermissionDefinition};
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("module {0} is not part of the working copy")]
    UnknownModule(ModuleId),

    #[error("permission '{codename}' is not available on module {module}")]
    UnknownPermission { module: ModuleId, codename: String },

    #[error("empty module path")]
    EmptyPath,

    #[error("a save for this role is already in flight")]
    SaveInFlight,

    #[error("save task aborted before completion")]
    Aborted,

    #[error(transparent)]
    Backend(#[from] SessionError),
}

/// One module's grants for the edited role, with its child modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGrants {
    pub module_id: ModuleId,
    pub module_name: String,
    pub available_permissions: Vec<PermissionDefinition>,
    pub granted_permissions: BTreeSet<Codename>,
    #[serde(default)]
    pub children: Vec<ModuleGrants>,
}

/// How much of a permission group is currently granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    All,
    Partial,
    None,
}

impl ModuleGrants {
    fn available(&self) -> impl Iterator<Item = &Codename> {
        self.available_permissions.iter().map(|d| &d.codename)
    }

    fn in_category(&self, category: PermissionCategory) -> impl Iterator<Item = &Codename> {
        self.available_permissions
            .iter()
            .filter(move |d| d.category == category)
            .map(|d| &d.codename)
    }

    /// Flip one codename. Stale grants (no longer defined) can be switched
    /// off but not on.
    pub fn toggled(&self, codename: &str) -> Result<ModuleGrants, EditorError> {
        let mut next = self.clone();
        if !next.granted_permissions.remove(codename) {
            if !self.available().any(|c| c.as_str() == codename) {
                return Err(EditorError::UnknownPermission {
                    module: self.module_id,
                    codename: codename.to_string(),
                });
            }
            next.granted_permissions.insert(Codename::new(codename.to_string()));
        }
        Ok(next)
    }

    /// Select-all sets the grant set to every defined codename; clear
    /// empties it.
    pub fn with_all(&self, select: bool) -> ModuleGrants {
        let mut next = self.clone();
        next.granted_permissions = if select { self.available().cloned().collect() } else { BTreeSet::new() };
        next
    }

    /// Union in, or subtract out, one category. Other categories are left
    /// as they are.
    pub fn with_category(&self, category: PermissionCategory, select: bool) -> ModuleGrants {
        let mut next = self.clone();
        for codename in self.in_category(category) {
            if select {
                next.granted_permissions.insert(codename.clone());
            } else {
                next.granted_permissions.remove(codename);
            }
        }
        next
    }

    pub fn selection_state(&self) -> SelectionState {
        state_of(self.available(), &self.granted_permissions)
    }

    pub fn category_state(&self, category: PermissionCategory) -> SelectionState {
        state_of(self.in_category(category), &self.granted_permissions)
    }

    /// Definitions grouped by category in canonical order. Empty categories
    /// are skipped.
    pub fn grouped_definitions(&self) -> Vec<(PermissionCategory, Vec<&PermissionDefinition>)> {
        PermissionCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let defs: Vec<_> = self
                    .available_permissions
                    .iter()
                    .filter(|d| d.category == category)
                    .collect();
                (!defs.is_empty()).then_some((category, defs))
            })
            .collect()
    }
}

fn state_of<'a>(candidates: impl Iterator<Item = &'a Codename>, granted: &BTreeSet<Codename>) -> SelectionState {
    let (mut total, mut hit) = (0usize, 0usize);
    for codename in candidates {
        total += 1;
        if granted.contains(codename) {
            hit += 1;
        }
    }
    match (total, hit) {
        (0, _) | (_, 0) => SelectionState::None,
        (t, h) if t == h => SelectionState::All,
        _ => SelectionState::Partial,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Working copy
// ─────────────────────────────────────────────────────────────────────────────

/// The full grant tree for one role, as displayed by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingCopy {
    pub role_id: RoleId,
    pub modules: Vec<ModuleGrants>,
}

impl WorkingCopy {
    pub fn new(role_id: RoleId, modules: Vec<ModuleGrants>) -> Self {
        Self { role_id, modules }
    }

    /// Address of a module as `[parent, child]` or `[top_level]`.
    pub fn path_to(&self, module: ModuleId) -> Option<Vec<ModuleId>> {
        fn walk(nodes: &[ModuleGrants], target: ModuleId, trail: &mut Vec<ModuleId>) -> bool {
            for node in nodes {
                trail.push(node.module_id);
                if node.module_id == target || walk(&node.children, target, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }
        let mut trail = Vec::new();
        walk(&self.modules, module, &mut trail).then_some(trail)
    }

    pub fn get(&self, path: &[ModuleId]) -> Option<&ModuleGrants> {
        let (first, rest) = path.split_first()?;
        let mut node = self.modules.iter().find(|m| m.module_id == *first)?;
        for id in rest {
            node = node.children.iter().find(|m| m.module_id == *id)?;
        }
        Some(node)
    }

    /// Replace the node at `path` with `transform(node)`. Everything else is
    /// carried over unchanged.
    pub fn update<F>(&self, path: &[ModuleId], transform: F) -> Result<WorkingCopy, EditorError>
    where
        F: FnOnce(&ModuleGrants) -> Result<ModuleGrants, EditorError>,
    {
        fn rebuild<F>(nodes: &[ModuleGrants], path: &[ModuleId], transform: F) -> Result<Vec<ModuleGrants>, EditorError>
        where
            F: FnOnce(&ModuleGrants) -> Result<ModuleGrants, EditorError>,
        {
            let Some((head, rest)) = path.split_first() else {
                return Ok(nodes.to_vec());
            };
            let pos = nodes
                .iter()
                .position(|n| n.module_id == *head)
                .ok_or(EditorError::UnknownModule(*head))?;

            let mut out = nodes.to_vec();
            out[pos] = if rest.is_empty() {
                transform(&nodes[pos])?
            } else {
                let mut node = nodes[pos].clone();
                node.children = rebuild(&nodes[pos].children, rest, transform)?;
                node
            };
            Ok(out)
        }

        if path.is_empty() {
            return Err(EditorError::EmptyPath);
        }
        Ok(WorkingCopy {
            role_id: self.role_id,
            modules: rebuild(&self.modules, path, transform)?,
        })
    }

    fn update_module<F>(&self, module: ModuleId, transform: F) -> Result<WorkingCopy, EditorError>
    where
        F: FnOnce(&ModuleGrants) -> Result<ModuleGrants, EditorError>,
    {
        let path = self.path_to(module).ok_or(EditorError::UnknownModule(module))?;
        self.update(&path, transform)
    }

    pub fn toggle_permission(&self, module: ModuleId, codename: &str) -> Result<WorkingCopy, EditorError> {
        self.update_module(module, |m| m.toggled(codename))
    }

    pub fn set_module(&self, module: ModuleId, select: bool) -> Result<WorkingCopy, EditorError> {
        self.update_module(module, |m| Ok(m.with_all(select)))
    }

    pub fn set_category(
        &self,
        module: ModuleId,
        category: PermissionCategory,
        select: bool,
    ) -> Result<WorkingCopy, EditorError> {
        self.update_module(module, |m| Ok(m.with_category(category, select)))
    }

    /// Flatten to the replace payload: each parent followed by its
    /// children. Every displayed module is included, empty sets too.
    pub fn to_payload(&self) -> Vec<GrantEntry> {
        fn push(nodes: &[ModuleGrants], out: &mut Vec<GrantEntry>) {
            for node in nodes {
                out.push(GrantEntry {
                    module_id: node.module_id,
                    granted: node.granted_permissions.iter().cloned().collect(),
                });
                push(&node.children, out);
            }
        }
        let mut out = Vec::new();
        push(&self.modules, &mut out);
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Editor session
// ─────────────────────────────────────────────────────────────────────────────

/// Backend calls the editor depends on.
#[async_trait]
pub trait GrantBackend: Send + Sync {
    async fn fetch_role_grants(&self, role: RoleId) -> Result<Vec<ModuleGrants>, SessionError>;

    async fn replace_role_grants(&self, role: RoleId, entries: Vec<GrantEntry>) -> Result<(), SessionError>;
}

#[async_trait]
impl<B> GrantBackend for Arc<B>
where
    B: GrantBackend + ?Sized,
{
    async fn fetch_role_grants(&self, role: RoleId) -> Result<Vec<ModuleGrants>, SessionError> {
        (**self).fetch_role_grants(role).await
    }

    async fn replace_role_grants(&self, role: RoleId, entries: Vec<GrantEntry>) -> Result<(), SessionError> {
        (**self).replace_role_grants(role, entries).await
    }
}

/// Clears the in-flight flag when the save task finishes, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PermissionEditor<B> {
    backend: Arc<B>,
    /// Last copy the backend accepted. Written by the save task, so a save
    /// whose future was dropped still lands here.
    saved: Arc<Mutex<WorkingCopy>>,
    working: WorkingCopy,
    saving: Arc<AtomicBool>,
}

impl<B> PermissionEditor<B>
where
    B: GrantBackend + 'static,
{
    /// Fetch the role's current grant tree and open an editing session.
    pub async fn load(backend: Arc<B>, role: RoleId) -> Result<Self, EditorError> {
        let modules = backend.fetch_role_grants(role).await?;
        let copy = WorkingCopy::new(role, modules);
        Ok(Self {
            backend,
            saved: Arc::new(Mutex::new(copy.clone())),
            working: copy,
            saving: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.working
    }

    fn saved(&self) -> MutexGuard<'_, WorkingCopy> {
        // Plain data: a poisoned guard still holds a whole copy.
        self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_dirty(&self) -> bool {
        self.working != *self.saved()
    }

    /// True while a save is running; commit controls should be disabled.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Apply one transform to the working copy. A failed transform leaves
    /// the working copy unchanged.
    pub fn apply<F>(&mut self, transform: F) -> Result<(), EditorError>
    where
        F: FnOnce(&WorkingCopy) -> Result<WorkingCopy, EditorError>,
    {
        self.working = transform(&self.working)?;
        Ok(())
    }

    pub fn toggle_permission(&mut self, module: ModuleId, codename: &str) -> Result<(), EditorError> {
        self.apply(|w| w.toggle_permission(module, codename))
    }

    pub fn set_module(&mut self, module: ModuleId, select: bool) -> Result<(), EditorError> {
        self.apply(|w| w.set_module(module, select))
    }

    pub fn set_category(&mut self, module: ModuleId, category: PermissionCategory, select: bool) -> Result<(), EditorError> {
        self.apply(|w| w.set_category(module, category, select))
    }

    /// Drop local edits.
    pub fn reset(&mut self) {
        let saved = self.saved().clone();
        self.working = saved;
    }

    /// Persist the working copy.
    ///
    /// The backend call runs on its own task: dropping the returned future
    /// does not cancel a replace that has already been issued. A second
    /// save while one is running fails with [`EditorError::SaveInFlight`].
    pub async fn save(&mut self) -> Result<(), EditorError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EditorError::SaveInFlight);
        }
        let guard = InFlight(Arc::clone(&self.saving));

        let role = self.working.role_id;
        let payload = self.working.to_payload();
        let entries = payload.len();
        let snapshot = self.working.clone();
        let saved = Arc::clone(&self.saved);
        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = backend.replace_role_grants(role, payload).await;
            if result.is_ok() {
                *saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
            }
            result
        });

        match task.await {
            Ok(Ok(())) => {
                tracing::info!(role = %role, entries, "role grants saved");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(role = %role, error = %e, "saving role grants failed");
                Err(e.into())
            }
            Err(_) => Err(EditorError::Aborted),
        }
    }
}
