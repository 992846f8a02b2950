//! Local key-value persistence: backend contract, in-memory backend and the
//! typed `LocalStore` wrapper.

mod backend;
pub mod keys;
mod local_store;
mod memory;

pub use backend::{ChangeHub, KeyValueBackend, StoreChange, StoreEvent, CHANGE_FEED_CAPACITY};
pub use keys::*;
pub use local_store::LocalStore;
pub use memory::MemoryBackend;
