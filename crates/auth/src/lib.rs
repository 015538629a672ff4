//! `adminkit-auth`: the console's authorization and navigation engine.
//!
//! Pure data structures and policy (catalog, grants, evaluator, menu
//! derivation, editor transforms) plus the async session resolver. No HTTP
//! and no storage.

pub mod authorize;
pub mod catalog;
pub mod claims;
pub mod editor;
pub mod grants;
pub mod jwt;
pub mod menu;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;
pub mod user;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DenialKind, ModuleAccess, PermissionIndex, access, authorize, can_add,
    can_delete, can_edit, can_view, explain, find_module, has_all, has_any, has_permission,
};
pub use catalog::{Catalog, GROUPING_PATH, Module, ModulePatch, ModuleWithDefinitions, NewModule};
pub use claims::{TokenClaims, TokenKind, TokenPair, TokenValidationError, validate_claims};
pub use editor::{EditorError, GrantBackend, ModuleGrants, PermissionEditor, SelectionState, WorkingCopy};
pub use grants::{GrantEntry, GrantStore};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use menu::{MenuItem, derive_menu};
pub use permissions::{Codename, DefinitionPatch, NewPermissionDefinition, PermissionCategory, PermissionDefinition};
pub use principal::{AggregatedView, Principal};
pub use roles::{Department, NewDepartment, NewRole, Role, RolePatch};
pub use session::{AuthBackend, SessionContext, SessionError, SessionState};
pub use user::{NewUser, User, UserProfile};
