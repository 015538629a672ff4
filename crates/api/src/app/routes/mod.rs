use axum::{Router, routing::get};

pub mod departments;
pub mod modules;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/api/whoami", get(system::whoami))
        .route("/api/authz/explain", get(system::explain))
        .merge(users::router())
        .merge(modules::router())
        .merge(roles::router())
        .merge(departments::router())
}
