//! Raw key-value backend contract and change notifications.

use tokio::sync::broadcast;
use uuid::Uuid;

use super::keys::PROBE_KEY;
use crate::errors::Result;

/// Capacity of per-store change feeds. Slow subscribers observe `Lagged`.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// A mutation observed on a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Every key was removed at once.
    Cleared,
    /// One key was written (`new_value` set) or removed (`new_value` empty).
    KeyChanged {
        key: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

/// A change together with the handle that caused it.
///
/// Subscribers compare `origin` against their own handle to drop same-handle
/// writes, which the platform never reports back to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub origin: Uuid,
    pub change: StoreChange,
}

impl StoreEvent {
    pub fn cleared(origin: Uuid) -> Self {
        Self {
            origin,
            change: StoreChange::Cleared,
        }
    }

    pub fn key_changed(
        origin: Uuid,
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            origin,
            change: StoreChange::KeyChanged {
                key: key.into(),
                old_value,
                new_value,
            },
        }
    }

    /// Key removed by this event, if it is a single-key removal.
    pub fn removed_key(&self) -> Option<&str> {
        match &self.change {
            StoreChange::KeyChanged {
                key,
                new_value: None,
                ..
            } => Some(key.as_str()),
            _ => None,
        }
    }
}

/// String-to-string persistent store.
///
/// Implementations are synchronous and must be safe to share between tasks.
/// Values are opaque serialized JSON; typing happens in `LocalStore`.
pub trait KeyValueBackend: Send + Sync {
    /// Identity of this handle, stamped on every event it emits.
    fn origin(&self) -> Uuid;

    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;

    /// Change feed shared by all handles on the same underlying store.
    ///
    /// `None` means the backend cannot report changes and callers must poll.
    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        None
    }
}

/// Sender side of a change feed, shared by sibling handles.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<StoreEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error. Availability
    /// probe writes are never published.
    pub fn publish(&self, event: StoreEvent) {
        if matches!(&event.change, StoreChange::KeyChanged { key, .. } if key == PROBE_KEY) {
            return;
        }
        let _ = self.sender.send(event);
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_writes_stay_off_the_feed() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe();
        let origin = Uuid::new_v4();

        hub.publish(StoreEvent::key_changed(origin, PROBE_KEY, None, Some("x".into())));
        hub.publish(StoreEvent::cleared(origin));

        assert_eq!(rx.try_recv().unwrap().change, StoreChange::Cleared);
        assert!(rx.try_recv().is_err());
    }
}
