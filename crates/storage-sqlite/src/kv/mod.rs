mod backend;
mod model;

pub use backend::{SqliteKeyValueBackend, SqliteStore};
pub use model::KvEntryDB;
