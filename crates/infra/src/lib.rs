//! Infrastructure layer: the console's backing store and demo seed data.

pub mod seed;
pub mod store;

pub use seed::{SeedReport, seed_demo_data};
pub use store::{ConsoleStore, InMemoryConsoleStore};
