//! Menu Derivation: the role-scoped navigation tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use adminkit_core::ModuleId;

use crate::catalog::Module;
use crate::permissions::Codename;
use crate::principal::AggregatedView;

/// One navigation entry as seen by a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: ModuleId,
    pub module_name: String,
    pub icon: Option<String>,
    pub path: String,
    pub order: i32,
    #[serde(default)]
    pub permissions: BTreeSet<Codename>,
    #[serde(default)]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    fn from_module(module: &Module, permissions: BTreeSet<Codename>) -> Self {
        Self {
            id: module.id,
            module_name: module.name.clone(),
            icon: module.icon.clone(),
            path: module.path.clone(),
            order: module.order,
            permissions,
            children: Vec::new(),
        }
    }

    /// Present only to group children; carries no permission of its own.
    pub fn is_grouping(&self) -> bool {
        self.permissions.is_empty() && !self.children.is_empty()
    }
}

/// Derive the navigation tree for a principal.
///
/// `modules` is the catalog's active top-level list (children attached).
/// A module is kept when the view grants it anything; a parent with no
/// direct grant is kept as a grouping node when a child survives. Only one
/// level of children is rendered. Catalog order is preserved.
pub fn derive_menu(modules: &[Module], view: &AggregatedView) -> Vec<MenuItem> {
    let menu: Vec<MenuItem> = modules
        .iter()
        .filter_map(|parent| {
            let children: Vec<MenuItem> = parent
                .children
                .iter()
                .filter(|child| view.grants_anything(child.id))
                .map(|child| MenuItem::from_module(child, view.permissions(child.id)))
                .collect();

            let own = view.permissions(parent.id);
            if own.is_empty() && children.is_empty() {
                return None;
            }
            let mut item = MenuItem::from_module(parent, own);
            item.children = children;
            Some(item)
        })
        .collect();

    tracing::debug!(roles = ?view.roles, entries = menu.len(), "derived menu");
    menu
}

/// Depth-first walk over parents, then each parent's children.
pub fn flatten(menu: &[MenuItem]) -> impl Iterator<Item = &MenuItem> {
    menu.iter()
        .flat_map(|parent| std::iter::once(parent).chain(parent.children.iter()))
}
