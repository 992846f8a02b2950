//! Bloomtrack data layer: local key-value persistence, backup/restore of
//! important keys, remote record sync and the date logic the records feed.

pub mod backup;
pub mod calendar;
pub mod errors;
pub mod identity;
pub mod records;
pub mod store;
pub mod sync;

pub use errors::{Error, Result};
