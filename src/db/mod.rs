pub mod migrations;
pub mod repository;
pub mod store;

pub use repository::SqliteStore;
pub use store::{keys, MemoryStore, Store};
