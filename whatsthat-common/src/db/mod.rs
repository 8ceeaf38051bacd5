//! SQLite storage

pub mod init;
pub mod store;

pub use init::{init_database, init_memory_database};
pub use store::SqliteStore;
