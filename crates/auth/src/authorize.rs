//! Authorization Evaluator.
//!
//! Every check runs against a principal's derived menu. Module lookup scans
//! each top-level entry and then its children; the first exact path match
//! wins. An unknown path denies every codename.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::catalog::GROUPING_PATH;
use crate::menu::{MenuItem, flatten};
use crate::permissions::Codename;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{codename}' on '{path}'")]
    Forbidden { path: String, codename: String },
}

/// Locate the menu entry for `path`. Grouping paths (`#`) never match.
pub fn find_module<'a>(menu: &'a [MenuItem], path: &str) -> Option<&'a MenuItem> {
    if path == GROUPING_PATH {
        return None;
    }
    flatten(menu).find(|item| item.path == path)
}

pub fn has_permission(menu: &[MenuItem], path: &str, codename: &str) -> bool {
    access(menu, path).has(codename)
}

pub fn can_view(menu: &[MenuItem], path: &str) -> bool {
    access(menu, path).can_view()
}

pub fn can_add(menu: &[MenuItem], path: &str) -> bool {
    access(menu, path).can_add()
}

pub fn can_edit(menu: &[MenuItem], path: &str) -> bool {
    access(menu, path).can_edit()
}

pub fn can_delete(menu: &[MenuItem], path: &str) -> bool {
    access(menu, path).can_delete()
}

/// True if any of `codenames` is granted. False for an empty list.
pub fn has_any<I, S>(menu: &[MenuItem], path: &str, codenames: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    access(menu, path).has_any(codenames)
}

/// True if all of `codenames` are granted. Vacuously true for an empty list,
/// even on an unknown path.
pub fn has_all<I, S>(menu: &[MenuItem], path: &str, codenames: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    access(menu, path).has_all(codenames)
}

/// Resolve a path once and answer several checks against it.
pub fn access<'a>(menu: &'a [MenuItem], path: &str) -> ModuleAccess<'a> {
    ModuleAccess {
        permissions: find_module(menu, path).map(|item| &item.permissions),
    }
}

/// Authorize one codename on one module path.
pub fn authorize(menu: &[MenuItem], path: &str, codename: &str) -> Result<(), AuthzError> {
    if has_permission(menu, path, codename) {
        Ok(())
    } else {
        tracing::warn!(path, codename, "authorization denied");
        Err(AuthzError::Forbidden {
            path: path.to_string(),
            codename: codename.to_string(),
        })
    }
}

/// Capability surface for one module, as resolved from a menu.
#[derive(Debug, Clone, Copy)]
pub struct ModuleAccess<'a> {
    permissions: Option<&'a BTreeSet<Codename>>,
}

impl<'a> ModuleAccess<'a> {
    pub fn found(&self) -> bool {
        self.permissions.is_some()
    }

    /// Granted codenames; `None` when the module was not found.
    pub fn permissions(&self) -> Option<&'a BTreeSet<Codename>> {
        self.permissions
    }

    pub fn has(&self, codename: &str) -> bool {
        self.permissions.is_some_and(|set| set.contains(codename))
    }

    pub fn has_any<I, S>(&self, codenames: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codenames.into_iter().any(|c| self.has(c.as_ref()))
    }

    pub fn has_all<I, S>(&self, codenames: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codenames.into_iter().all(|c| self.has(c.as_ref()))
    }

    pub fn can_view(&self) -> bool {
        self.has(Codename::VIEW.as_str())
    }

    pub fn can_add(&self) -> bool {
        self.has(Codename::ADD.as_str())
    }

    pub fn can_edit(&self) -> bool {
        self.has(Codename::EDIT.as_str())
    }

    pub fn can_delete(&self) -> bool {
        self.has(Codename::DELETE.as_str())
    }
}

/// `path -> permission set` map built once per menu.
///
/// Answers exactly like the scanning functions above; first match wins when
/// a path appears twice.
#[derive(Debug, Clone, Default)]
pub struct PermissionIndex {
    by_path: HashMap<String, BTreeSet<Codename>>,
}

impl PermissionIndex {
    pub fn new(menu: &[MenuItem]) -> Self {
        let mut by_path = HashMap::new();
        for item in flatten(menu) {
            if item.path == GROUPING_PATH {
                continue;
            }
            by_path
                .entry(item.path.clone())
                .or_insert_with(|| item.permissions.clone());
        }
        Self { by_path }
    }

    pub fn module(&self, path: &str) -> ModuleAccess<'_> {
        ModuleAccess {
            permissions: self.by_path.get(path),
        }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub module_path: String,
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub module_found: bool,
    /// Codenames granted on the module, sorted.
    pub effective_permissions: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownModule,
    MissingPermission,
}

/// Explain why a check on `path` would be allowed or denied.
pub fn explain(menu: &[MenuItem], path: &str, codename: &str) -> AuthorizationExplanation {
    let Some(item) = find_module(menu, path) else {
        return AuthorizationExplanation {
            module_path: path.to_string(),
            required_permission: codename.to_string(),
            granted: false,
            reason: format!("No module with path '{path}' is visible to the principal"),
            module_found: false,
            effective_permissions: Vec::new(),
            denial_reason: Some(DenialReason {
                kind: DenialKind::UnknownModule,
                message: format!("Module '{path}' is not part of the principal's menu"),
                suggestions: vec![
                    "Check that the module exists and is active".to_string(),
                    format!("Grant at least one permission on '{path}' to one of the principal's roles"),
                ],
            }),
        };
    };

    let effective: Vec<String> = item.permissions.iter().map(|c| c.as_str().to_string()).collect();
    if item.permissions.contains(codename) {
        return AuthorizationExplanation {
            module_path: path.to_string(),
            required_permission: codename.to_string(),
            granted: true,
            reason: format!("Principal has '{codename}' on '{}'", item.module_name),
            module_found: true,
            effective_permissions: effective,
            denial_reason: None,
        };
    }

    AuthorizationExplanation {
        module_path: path.to_string(),
        required_permission: codename.to_string(),
        granted: false,
        reason: format!(
            "Principal does not have '{codename}' on '{}'. Current permissions: {:?}",
            item.module_name, effective
        ),
        module_found: true,
        effective_permissions: effective,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{codename}'"),
            suggestions: vec![format!(
                "Assign a role that grants '{codename}' on '{}'",
                item.module_name
            )],
        }),
    }
}
