use serde::{Deserialize, Serialize};

use adminkit_core::{DepartmentId, DomainError, DomainResult, Entity, RoleId};

/// A named bundle of grants that can be assigned to users.
///
/// Roles own their grants; the grants themselves live in the
/// [`GrantStore`](crate::grants::GrantStore) keyed by role id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub department: Option<DepartmentId>,
    pub is_active: bool,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> RoleId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub department: Option<DepartmentId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            department: None,
            is_active: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn department(mut self, department: DepartmentId) -> Self {
        self.department = Some(department);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        Ok(())
    }

    pub fn into_role(self, id: RoleId) -> Role {
        Role {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            department: self.department,
            is_active: self.is_active,
        }
    }
}

/// Partial update of a role. `department: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub department: Option<Option<DepartmentId>>,
    pub is_active: Option<bool>,
}

impl RolePatch {
    pub fn apply(self, role: &Role) -> DomainResult<Role> {
        let mut next = role.clone();
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("role name cannot be empty"));
            }
            next.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            next.description = description;
        }
        if let Some(department) = self.department {
            next.department = department;
        }
        if let Some(active) = self.is_active {
            next.is_active = active;
        }
        Ok(next)
    }
}

/// Organisational unit roles and users may belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
}

impl Entity for Department {
    type Id = DepartmentId;

    fn id(&self) -> DepartmentId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl NewDepartment {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            description: String::new(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("department name cannot be empty"));
        }
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("department code cannot be empty"));
        }
        Ok(())
    }
}
