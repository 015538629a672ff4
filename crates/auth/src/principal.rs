use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use adminkit_core::{ModuleId, RoleId};

use crate::menu::MenuItem;
use crate::permissions::Codename;
use crate::user::UserProfile;

/// A principal's aggregated permission view: for each module reachable by
/// any of its roles, the union of codenames granted across those roles.
///
/// Derived, never mutated in place. Recompute it from current grants to
/// pick up role edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedView {
    pub roles: Vec<RoleId>,
    pub modules: BTreeMap<ModuleId, BTreeSet<Codename>>,
}

impl AggregatedView {
    /// Granted codenames for a module; empty when nothing is granted.
    pub fn permissions(&self, module: ModuleId) -> BTreeSet<Codename> {
        self.modules.get(&module).cloned().unwrap_or_default()
    }

    pub fn grants_anything(&self, module: ModuleId) -> bool {
        self.modules.get(&module).is_some_and(|set| !set.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.values().all(BTreeSet::is_empty)
    }
}

/// The authenticated user together with their role-scoped menu.
///
/// The menu is the already-derived navigation tree; every capability check
/// during the session runs against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub profile: UserProfile,
    pub menu: Vec<MenuItem>,
}

impl Principal {
    pub fn new(profile: UserProfile, menu: Vec<MenuItem>) -> Self {
        Self { profile, menu }
    }
}
