//! SQLite-backed primary key-value store for Bloomtrack.

pub mod db;
pub mod errors;
pub mod kv;
pub mod schema;

pub use errors::StorageError;
pub use kv::{SqliteKeyValueBackend, SqliteStore};
