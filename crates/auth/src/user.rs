//! Console users (principal identities).
//!
//! Password hashing is a storage concern; this module only carries the
//! opaque hash and never serializes it.

use serde::{Deserialize, Serialize};

use adminkit_core::{DepartmentId, DomainError, DomainResult, Entity, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    pub department: Option<DepartmentId>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    pub is_active: bool,
    #[serde(skip)]
    pub password_hash: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            employee_id: self.employee_id.clone(),
            department: self.department,
            roles: self.roles.clone(),
            is_active: self.is_active,
        }
    }

    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() { self.username.clone() } else { full.to_string() }
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Public view of a user, safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub employee_id: Option<String>,
    pub department: Option<DepartmentId>,
    pub roles: Vec<RoleId>,
    pub is_active: bool,
}

/// Registration input. The password is plain text and must be hashed by
/// the store before it is kept anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub department: Option<DepartmentId>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            employee_id: None,
            department: None,
            roles: Vec::new(),
        }
    }

    pub fn name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    pub fn department(mut self, department: DepartmentId) -> Self {
        self.department = Some(department);
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if self.username.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("username must not contain whitespace"));
        }
        if !self.email.contains('@') {
            return Err(DomainError::validation(format!("'{}' is not an email address", self.email)));
        }
        if self.password.is_empty() {
            return Err(DomainError::validation("password cannot be empty"));
        }
        Ok(())
    }

    pub fn into_user(self, id: UserId, password_hash: String) -> User {
        let mut roles = self.roles;
        roles.sort();
        roles.dedup();
        User {
            id,
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            employee_id: self.employee_id,
            department: self.department,
            roles,
            is_active: true,
            password_hash,
        }
    }
}
