use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use adminkit_core::{DomainError, ModuleId, PermissionId};

/// Permission codename, scoped to one module (e.g. "view", "export_csv").
///
/// Codenames are open strings: the catalog is configured at runtime, so the
/// set of codenames cannot be enumerated at compile time. A codename only
/// means something together with the module it is declared on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Codename(Cow<'static, str>);

impl Codename {
    pub const VIEW: Codename = Codename(Cow::Borrowed("view"));
    pub const ADD: Codename = Codename(Cow::Borrowed("add"));
    pub const EDIT: Codename = Codename(Cow::Borrowed("edit"));
    pub const DELETE: Codename = Codename(Cow::Borrowed("delete"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Codenames must be non-empty and free of whitespace.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::validation("codename cannot be empty"));
        }
        if self.0.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "codename '{}' must not contain whitespace",
                self.0
            )));
        }
        Ok(())
    }
}

impl core::fmt::Display for Codename {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Codename {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Codename {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl core::borrow::Borrow<str> for Codename {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What kind of capability a permission gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Record-level create/read/update/delete.
    #[default]
    Crud,
    /// Visibility of a table column.
    Column,
    /// Visibility of a screen component (card, widget).
    Component,
    /// A record or bulk action (export, reset password).
    Action,
    /// Visibility or editability of a form field.
    Field,
}

impl PermissionCategory {
    /// Canonical display order.
    pub const ALL: [PermissionCategory; 5] = [
        PermissionCategory::Crud,
        PermissionCategory::Column,
        PermissionCategory::Component,
        PermissionCategory::Action,
        PermissionCategory::Field,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionCategory::Crud => "crud",
            PermissionCategory::Column => "column",
            PermissionCategory::Component => "component",
            PermissionCategory::Action => "action",
            PermissionCategory::Field => "field",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PermissionCategory::Crud => "CRUD",
            PermissionCategory::Column => "Columns",
            PermissionCategory::Component => "Components",
            PermissionCategory::Action => "Actions",
            PermissionCategory::Field => "Fields",
        }
    }
}

impl core::fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PermissionCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crud" => Ok(PermissionCategory::Crud),
            "column" => Ok(PermissionCategory::Column),
            "component" => Ok(PermissionCategory::Component),
            "action" => Ok(PermissionCategory::Action),
            "field" => Ok(PermissionCategory::Field),
            other => Err(DomainError::validation(format!(
                "unknown permission category '{other}' (expected one of: crud, column, component, action, field)"
            ))),
        }
    }
}

/// A permission a module declares as assignable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub id: PermissionId,
    pub module_id: ModuleId,
    pub codename: Codename,
    pub label: String,
    pub category: PermissionCategory,
    pub order: i32,
}

impl PermissionDefinition {
    /// Sort key: category, then explicit order, then codename.
    pub fn sort_key(&self) -> (PermissionCategory, i32, &str) {
        (self.category, self.order, self.codename.as_str())
    }
}

/// Input for declaring a permission on a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermissionDefinition {
    pub codename: Codename,
    /// Blank labels are replaced with `Permission <order>`.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub category: PermissionCategory,
    /// Defaults to the 1-based position in the submitted list.
    #[serde(default)]
    pub order: Option<i32>,
}

impl NewPermissionDefinition {
    pub fn new(codename: impl Into<Codename>, label: impl Into<String>, category: PermissionCategory) -> Self {
        Self {
            codename: codename.into(),
            label: label.into(),
            category,
            order: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// The conventional view/add/edit/delete set.
    pub fn default_crud() -> Vec<NewPermissionDefinition> {
        vec![
            NewPermissionDefinition::new(Codename::VIEW, "Can View", PermissionCategory::Crud).with_order(1),
            NewPermissionDefinition::new(Codename::ADD, "Can Add", PermissionCategory::Crud).with_order(2),
            NewPermissionDefinition::new(Codename::EDIT, "Can Edit", PermissionCategory::Crud).with_order(3),
            NewPermissionDefinition::new(Codename::DELETE, "Can Delete", PermissionCategory::Crud).with_order(4),
        ]
    }
}

/// Partial update of a permission definition. The codename is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionPatch {
    pub label: Option<String>,
    pub category: Option<PermissionCategory>,
    pub order: Option<i32>,
}
