//! Redundant copies of the important keys and their automatic restoration.

mod blob;
mod watcher;

pub use blob::BackupBlob;
pub use watcher::{BackupWatcher, ChangeObserver, WatcherConfig, DEFAULT_BACKUP_INTERVAL_SECS};
