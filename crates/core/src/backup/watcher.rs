//! Backup watcher: periodic snapshots of the important keys plus event-driven
//! restoration after external deletions.
//!
//! Detection latency: with a change feed, external clears and removals are
//! repaired as soon as the event is delivered. Without one, the periodic tick
//! is the only detector and repairs land within one interval. Writes made
//! through the watcher's own store handle are never reported back to it, so
//! data lost through that handle is not repaired.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::blob::BackupBlob;
use crate::store::{LocalStore, StoreChange, StoreEvent, BACKUP_SLOT_KEY, IMPORTANT_KEYS};

/// Snapshot cadence.
pub const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub important_keys: Vec<String>,
    /// Restore important keys missing at start from a persisted blob.
    pub restore_on_start: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_BACKUP_INTERVAL_SECS),
            important_keys: IMPORTANT_KEYS.iter().map(|k| k.to_string()).collect(),
            restore_on_start: true,
        }
    }
}

impl WatcherConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Reactions to changes made outside this process' own store handle.
pub trait ChangeObserver: Send + Sync {
    /// The whole store was wiped. Returns the number of keys restored.
    fn on_external_clear(&self) -> usize;

    /// One key lost its value. Returns whether it was restored.
    fn on_external_key_removed(&self, key: &str) -> bool;
}

struct WatcherCore {
    primary: LocalStore,
    session: LocalStore,
    config: WatcherConfig,
    last_backup: RwLock<BackupBlob>,
}

impl WatcherCore {
    fn is_important(&self, key: &str) -> bool {
        self.config.important_keys.iter().any(|k| k == key)
    }

    fn current_backup(&self) -> BackupBlob {
        match self.last_backup.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_backup(&self, blob: BackupBlob) {
        match self.last_backup.write() {
            Ok(mut guard) => *guard = blob,
            Err(poisoned) => *poisoned.into_inner() = blob,
        }
    }

    /// Capture and persist a fresh blob. While the primary store is
    /// unavailable, before or during the capture, the previous blob is kept.
    fn snapshot(&self) -> BackupBlob {
        if !self.primary.is_available() {
            warn!("[Backup] primary store unavailable; keeping the previous backup");
            return self.current_backup();
        }
        let blob = BackupBlob::capture(&self.primary, &self.config.important_keys);
        if !self.primary.is_available() {
            warn!("[Backup] primary store failed during capture; keeping the previous backup");
            return self.current_backup();
        }
        self.persist(&blob);
        self.replace_backup(blob.clone());
        debug!("[Backup] snapshot holds {} keys", blob.len());
        blob
    }

    fn persist(&self, blob: &BackupBlob) {
        let raw = match blob.to_json() {
            Ok(raw) => raw,
            Err(err) => {
                warn!("[Backup] could not serialize backup blob: {}", err);
                return;
            }
        };
        if !self.primary.set_raw(BACKUP_SLOT_KEY, &raw) {
            warn!("[Backup] writing the primary backup slot failed");
        }
        if !self.session.set_raw(BACKUP_SLOT_KEY, &raw) {
            warn!("[Backup] writing the session backup mirror failed");
        }
    }

    /// Most recent persisted blob: primary slot first, session mirror second.
    fn load_persisted(&self) -> Option<BackupBlob> {
        for (label, store) in [("primary", &self.primary), ("session", &self.session)] {
            let Some(raw) = store.get_raw(BACKUP_SLOT_KEY) else {
                continue;
            };
            match BackupBlob::from_json(&raw) {
                Ok(blob) if !blob.is_empty() => return Some(blob),
                Ok(_) => {}
                Err(err) => warn!("[Backup] ignoring unreadable {} backup slot: {}", label, err),
            }
        }
        None
    }

    /// In-memory blob, or the persisted one if nothing was captured yet.
    fn blob_for_restore(&self) -> BackupBlob {
        let blob = self.current_backup();
        if !blob.is_empty() {
            return blob;
        }
        self.load_persisted().unwrap_or_default()
    }

    fn restore_key(&self, blob: &BackupBlob, key: &str) -> bool {
        let Some(value) = blob.get(key) else {
            return false;
        };
        let restored = self.primary.set_raw(key, value);
        if !restored {
            warn!("[Backup] failed to restore '{}'", key);
        }
        restored
    }

    fn restore_missing(&self) -> usize {
        let blob = self.blob_for_restore();
        let restored = blob
            .missing_from(&self.primary)
            .iter()
            .filter(|key| self.is_important(key))
            .filter(|key| self.restore_key(&blob, key))
            .count();
        if restored > 0 {
            info!("[Backup] restored {} missing keys", restored);
        }
        restored
    }

    fn has_data_loss(&self) -> bool {
        !self.current_backup().missing_from(&self.primary).is_empty()
    }

    fn handle_event(&self, event: &StoreEvent) {
        if event.origin == self.primary.backend().origin() {
            return;
        }
        match &event.change {
            StoreChange::Cleared => {
                self.on_external_clear();
            }
            StoreChange::KeyChanged {
                key,
                new_value: None,
                ..
            } if self.is_important(key) => {
                self.on_external_key_removed(key);
            }
            StoreChange::KeyChanged { .. } => {}
        }
    }

    fn on_tick(&self, poll_only: bool) {
        if poll_only {
            self.restore_missing();
        }
        self.snapshot();
    }
}

impl ChangeObserver for WatcherCore {
    fn on_external_clear(&self) -> usize {
        let blob = self.blob_for_restore();
        if blob.is_empty() {
            info!("[Backup] store cleared externally but no backup is available");
            return 0;
        }
        let important: Vec<&str> = blob.keys().filter(|key| self.is_important(key)).collect();
        let restored = important
            .iter()
            .filter(|key| self.restore_key(&blob, key))
            .count();
        self.persist(&blob);
        info!(
            "[Backup] store cleared externally; restored {}/{} keys",
            restored,
            important.len()
        );
        restored
    }

    fn on_external_key_removed(&self, key: &str) -> bool {
        if !self.is_important(key) {
            return false;
        }
        let restored = self.restore_key(&self.blob_for_restore(), key);
        if restored {
            info!("[Backup] '{}' removed externally; restored from backup", key);
        }
        restored
    }
}

async fn next_event(
    feed: &mut Option<broadcast::Receiver<StoreEvent>>,
) -> Result<StoreEvent, RecvError> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_watch_loop(core: Arc<WatcherCore>, mut feed: Option<broadcast::Receiver<StoreEvent>>) {
    let period = core.config.interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => core.on_tick(feed.is_none()),
            received = next_event(&mut feed) => match received {
                Ok(event) => core.handle_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[Backup] change feed lagged by {} events; reconciling", skipped);
                    core.restore_missing();
                }
                Err(RecvError::Closed) => {
                    warn!("[Backup] change feed closed; falling back to polling");
                    feed = None;
                }
            },
        }
    }
}

/// Keeps a redundant copy of the important keys and puts them back when
/// another handle deletes them.
pub struct BackupWatcher {
    core: Arc<WatcherCore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackupWatcher {
    pub fn new(primary: LocalStore, session: LocalStore, config: WatcherConfig) -> Self {
        Self {
            core: Arc::new(WatcherCore {
                primary,
                session,
                config,
                last_backup: RwLock::new(BackupBlob::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Take the initial snapshot and spawn the timer/listener task on the
    /// current tokio runtime. Returns `false` outside a runtime. Calling it
    /// while running is a no-op.
    pub fn start(&self) -> bool {
        let mut guard = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return true;
            }
            guard.take();
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("[Backup] cannot start watcher without a runtime: {}", err);
                return false;
            }
        };

        if let Some(persisted) = self.core.load_persisted() {
            self.core.replace_backup(persisted);
        }
        if self.core.config.restore_on_start {
            self.core.restore_missing();
        }
        self.core.snapshot();

        let feed = self.core.primary.backend().subscribe();
        if feed.is_none() {
            info!(
                "[Backup] no change feed; polling every {:?}",
                self.core.config.interval
            );
        }
        *guard = Some(runtime.spawn(run_watch_loop(Arc::clone(&self.core), feed)));
        true
    }

    /// Cancel the timer and drop the subscription. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut guard = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            handle.abort();
            debug!("[Backup] watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        match self.task.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|h| !h.is_finished()),
            Err(poisoned) => poisoned
                .into_inner()
                .as_ref()
                .is_some_and(|h| !h.is_finished()),
        }
    }

    /// Capture and persist a fresh blob now.
    pub fn snapshot_now(&self) -> BackupBlob {
        self.core.snapshot()
    }

    pub fn last_backup(&self) -> BackupBlob {
        self.core.current_backup()
    }

    /// True when a backed-up key is absent from the primary store.
    pub fn has_data_loss(&self) -> bool {
        self.core.has_data_loss()
    }

    /// Dispatch one change-feed event.
    pub fn handle_event(&self, event: &StoreEvent) {
        self.core.handle_event(event);
    }

    /// Restore every backed-up important key absent from the primary store.
    pub fn restore_missing(&self) -> usize {
        self.core.restore_missing()
    }
}

impl ChangeObserver for BackupWatcher {
    fn on_external_clear(&self) -> usize {
        self.core.on_external_clear()
    }

    fn on_external_key_removed(&self, key: &str) -> bool {
        self.core.on_external_key_removed(key)
    }
}

impl Drop for BackupWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueBackend, MemoryBackend};
    use serde_json::json;

    struct Fixture {
        primary: LocalStore,
        other_tab: MemoryBackend,
        session: MemoryBackend,
    }

    fn fixture(backend: MemoryBackend) -> Fixture {
        let other_tab = backend.open_sibling();
        let session = MemoryBackend::new();
        Fixture {
            primary: LocalStore::new(Arc::new(backend)),
            other_tab,
            session,
        }
    }

    fn watcher_for(fx: &Fixture, config: WatcherConfig) -> BackupWatcher {
        BackupWatcher::new(
            fx.primary.clone(),
            LocalStore::new(Arc::new(fx.session.clone())),
            config,
        )
    }

    fn weight_records() -> serde_json::Value {
        json!([{"id": "1", "date": "2024-01-01", "weight": 60, "note": ""}])
    }

    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[test]
    fn external_clear_restores_every_backed_up_key() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("weightRecords", &weight_records()));
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        watcher.snapshot_now();

        fx.other_tab.clear().unwrap();
        assert_eq!(fx.primary.get_raw("weightRecords"), None);

        watcher.handle_event(&StoreEvent::cleared(fx.other_tab.origin()));

        assert_eq!(fx.primary.get("weightRecords", json!(null)), weight_records());
        assert_eq!(fx.primary.get("dueDate", String::new()), "2024-09-01");
        assert!(fx.primary.get_raw(BACKUP_SLOT_KEY).is_some());
    }

    #[test]
    fn single_removal_restores_only_that_key() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        assert!(fx.primary.set("lastPeriodDate", "2023-11-26"));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        watcher.snapshot_now();

        fx.other_tab.set_item("lastPeriodDate", "\"2023-12-01\"").unwrap();
        fx.other_tab.remove_item("dueDate").unwrap();
        watcher.handle_event(&StoreEvent::key_changed(
            fx.other_tab.origin(),
            "lastPeriodDate",
            Some("\"2023-11-26\"".to_string()),
            Some("\"2023-12-01\"".to_string()),
        ));
        watcher.handle_event(&StoreEvent::key_changed(
            fx.other_tab.origin(),
            "dueDate",
            Some("\"2024-09-01\"".to_string()),
            None,
        ));

        assert_eq!(fx.primary.get("dueDate", String::new()), "2024-09-01");
        assert_eq!(fx.primary.get("lastPeriodDate", String::new()), "2023-12-01");
    }

    #[test]
    fn same_handle_and_unimportant_changes_are_ignored() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        assert!(fx.primary.set("draftNote", "hello"));
        let watcher = watcher_for(
            &fx,
            WatcherConfig {
                important_keys: vec!["dueDate".to_string(), "draftNote".to_string()],
                ..WatcherConfig::default()
            },
        );
        watcher.snapshot_now();

        assert!(fx.primary.remove("dueDate"));
        watcher.handle_event(&StoreEvent::key_changed(
            fx.primary.backend().origin(),
            "dueDate",
            None,
            None,
        ));
        assert_eq!(fx.primary.get_raw("dueDate"), None);

        let narrowed = watcher_for(
            &fx,
            WatcherConfig {
                important_keys: vec!["lastPeriodDate".to_string()],
                ..WatcherConfig::default()
            },
        );
        fx.other_tab.remove_item("draftNote").unwrap();
        assert!(!narrowed.on_external_key_removed("draftNote"));
        assert_eq!(fx.primary.get_raw("draftNote"), None);
    }

    #[test]
    fn data_loss_is_reported_until_restored() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("kickSessions", &json!([])));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        watcher.snapshot_now();
        assert!(!watcher.has_data_loss());

        fx.other_tab.remove_item("kickSessions").unwrap();
        assert!(watcher.has_data_loss());

        assert_eq!(watcher.restore_missing(), 1);
        assert!(!watcher.has_data_loss());
    }

    #[test]
    fn clear_without_any_backup_restores_nothing() {
        let fx = fixture(MemoryBackend::new());
        let watcher = watcher_for(&fx, WatcherConfig::default());
        assert_eq!(watcher.on_external_clear(), 0);
    }

    #[test]
    fn start_outside_runtime_fails_softly() {
        let fx = fixture(MemoryBackend::new());
        let watcher = watcher_for(&fx, WatcherConfig::default());
        assert!(!watcher.start());
        assert!(!watcher.is_running());
        watcher.stop();
    }

    #[test]
    fn snapshot_is_mirrored_to_the_session_store() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        let blob = watcher.snapshot_now();

        let mirrored = fx.session.get_item(BACKUP_SLOT_KEY).unwrap().unwrap();
        assert_eq!(BackupBlob::from_json(&mirrored).unwrap(), blob);
        assert_eq!(fx.primary.get_raw(BACKUP_SLOT_KEY), Some(mirrored));
    }

    #[tokio::test]
    async fn running_watcher_repairs_an_external_clear() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("weightRecords", &weight_records()));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        assert!(watcher.start());
        assert!(watcher.is_running());

        fx.other_tab.clear().unwrap();

        let primary = fx.primary.clone();
        assert!(eventually(|| primary.get_raw("weightRecords").is_some()).await);
        assert_eq!(fx.primary.get("weightRecords", json!(null)), weight_records());

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn polling_watcher_repairs_within_one_interval() {
        let fx = fixture(MemoryBackend::without_change_feed());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(
            &fx,
            WatcherConfig::default().with_interval(Duration::from_millis(20)),
        );
        assert!(watcher.start());

        fx.other_tab.remove_item("dueDate").unwrap();

        let primary = fx.primary.clone();
        assert!(eventually(|| primary.get_raw("dueDate").is_some()).await);
        watcher.stop();
    }

    #[tokio::test]
    async fn start_restores_from_the_session_mirror() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        {
            let first = watcher_for(&fx, WatcherConfig::default());
            first.snapshot_now();
        }
        fx.other_tab.clear().unwrap();

        let second = watcher_for(&fx, WatcherConfig::default());
        assert!(second.start());
        assert_eq!(fx.primary.get("dueDate", String::new()), "2024-09-01");
        second.stop();
    }

    #[test]
    fn outage_tick_keeps_the_previous_backup() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(&fx, WatcherConfig::default());
        assert_eq!(watcher.snapshot_now().len(), 1);

        fx.other_tab.set_available(false);
        assert_eq!(watcher.snapshot_now().len(), 1);
        fx.other_tab.set_available(true);

        assert_eq!(watcher.last_backup().len(), 1);
        let mirrored = fx.session.get_item(BACKUP_SLOT_KEY).unwrap().unwrap();
        assert_eq!(BackupBlob::from_json(&mirrored).unwrap().len(), 1);

        fx.other_tab.clear().unwrap();
        assert_eq!(watcher.on_external_clear(), 1);
        assert_eq!(fx.primary.get("dueDate", String::new()), "2024-09-01");
    }

    #[test]
    fn clear_replays_only_keys_that_are_still_important() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        assert!(fx.primary.set("draftNote", "hello"));
        let wide = watcher_for(
            &fx,
            WatcherConfig {
                important_keys: vec!["dueDate".to_string(), "draftNote".to_string()],
                ..WatcherConfig::default()
            },
        );
        assert_eq!(wide.snapshot_now().len(), 2);
        drop(wide);

        let narrow = watcher_for(
            &fx,
            WatcherConfig {
                important_keys: vec!["dueDate".to_string()],
                ..WatcherConfig::default()
            },
        );
        fx.other_tab.clear().unwrap();

        assert_eq!(narrow.on_external_clear(), 1);
        assert_eq!(fx.primary.get("dueDate", String::new()), "2024-09-01");
        assert_eq!(fx.primary.get_raw("draftNote"), None);
    }

    #[tokio::test]
    async fn lagging_feed_reconciles_missing_keys() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(
            &fx,
            WatcherConfig::default().with_interval(Duration::from_secs(60)),
        );
        watcher.snapshot_now();

        let (tx, rx) = broadcast::channel(2);
        fx.other_tab.remove_item("dueDate").unwrap();
        let origin = fx.other_tab.origin();
        tx.send(StoreEvent::key_changed(
            origin,
            "dueDate",
            Some("\"2024-09-01\"".to_string()),
            None,
        ))
        .unwrap();
        for n in 0..3 {
            let draft = StoreEvent::key_changed(origin, format!("draft{}", n), None, Some("1".into()));
            tx.send(draft).unwrap();
        }

        let task = tokio::spawn(run_watch_loop(Arc::clone(&watcher.core), Some(rx)));
        let primary = fx.primary.clone();
        assert!(eventually(|| primary.get_raw("dueDate").is_some()).await);
        task.abort();
        drop(tx);
    }

    #[tokio::test]
    async fn closed_feed_falls_back_to_polling() {
        let fx = fixture(MemoryBackend::new());
        assert!(fx.primary.set("dueDate", "2024-09-01"));
        let watcher = watcher_for(
            &fx,
            WatcherConfig::default().with_interval(Duration::from_millis(50)),
        );
        watcher.snapshot_now();

        let (tx, rx) = broadcast::channel::<StoreEvent>(4);
        drop(tx);
        let task = tokio::spawn(run_watch_loop(Arc::clone(&watcher.core), Some(rx)));
        tokio::time::sleep(Duration::from_millis(10)).await;

        fx.other_tab.remove_item("dueDate").unwrap();

        let primary = fx.primary.clone();
        assert!(eventually(|| primary.get_raw("dueDate").is_some()).await);
        task.abort();
    }
}
