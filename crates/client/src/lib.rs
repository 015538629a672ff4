//! `adminkit-client`: HTTP implementation of the session and editor
//! backends, for consoles talking to `adminkit-api`.

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::{HttpBackend, SessionGrantBackend};
