//! Console storage abstractions.

pub mod console_store;
pub mod in_memory;

pub use console_store::ConsoleStore;
pub use in_memory::InMemoryConsoleStore;
