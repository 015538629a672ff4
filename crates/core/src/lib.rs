//! `adminkit-core`: identifiers and error primitives shared by every crate.
//!
//! No IO, no async, no framework types.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{DepartmentId, IdSequence, ModuleId, PermissionId, RoleId, UserId};
