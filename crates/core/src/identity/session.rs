use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::UserIdentity;
use crate::errors::{Error, Result};
use crate::store::{LocalStore, USER_KEY};

const AUTH_EVENT_CAPACITY: usize = 16;

/// Live authentication state.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    UserAuthenticated { user_id: String },
    SignedOut,
}

/// Broadcast channel for sign-in/sign-out notifications.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: AuthEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process session. Mirrors the signed-in identity into the local store.
pub struct AuthSession {
    current: RwLock<Option<UserIdentity>>,
    store: LocalStore,
    events: AuthEvents,
}

impl AuthSession {
    pub fn new(store: LocalStore) -> Self {
        Self {
            current: RwLock::new(None),
            store,
            events: AuthEvents::new(),
        }
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Install `identity` as the session user, stamp `lastLogin`, mirror it
    /// under `user` and announce it.
    pub fn sign_in(&self, mut identity: UserIdentity) -> bool {
        identity.last_login = Some(Utc::now());
        let mirrored = self.store.set(USER_KEY, &identity);
        if !mirrored {
            warn!("[Auth] could not mirror identity for {}", identity.uid);
        }
        let user_id = identity.uid.clone();
        match self.current.write() {
            Ok(mut guard) => *guard = Some(identity),
            Err(poisoned) => *poisoned.into_inner() = Some(identity),
        }
        info!("[Auth] signed in {}", user_id);
        self.events.publish(AuthEvent::UserAuthenticated { user_id });
        mirrored
    }

    pub fn sign_out(&self) -> bool {
        match self.current.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        let removed = self.store.remove(USER_KEY);
        self.events.publish(AuthEvent::SignedOut);
        info!("[Auth] signed out");
        removed
    }
}

impl SessionProvider for AuthSession {
    fn current_user(&self) -> Option<UserIdentity> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Picks the user a sync call runs as: the live session first, then the
/// identity cached in the local store.
#[derive(Clone)]
pub struct IdentityResolver {
    session: Arc<dyn SessionProvider>,
    store: LocalStore,
}

impl IdentityResolver {
    pub fn new(session: Arc<dyn SessionProvider>, store: LocalStore) -> Self {
        Self { session, store }
    }

    pub fn resolve(&self) -> Result<UserIdentity> {
        if let Some(identity) = self.session.current_user() {
            return Ok(identity);
        }
        match self.store.try_get::<UserIdentity>(USER_KEY) {
            Ok(Some(identity)) if !identity.uid.is_empty() => {
                debug!("[Auth] using cached identity {}", identity.uid);
                Ok(identity)
            }
            Ok(_) => Err(Error::not_authenticated("no session and no cached user")),
            Err(err) => Err(Error::not_authenticated(format!(
                "cached user unreadable: {}",
                err
            ))),
        }
    }

    pub fn resolve_uid(&self) -> Result<String> {
        self.resolve().map(|identity| identity.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use serde_json::json;

    fn store() -> LocalStore {
        LocalStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn identity_uses_photo_url_casing() {
        let mut identity = UserIdentity::new("u1");
        identity.photo_url = Some("https://img/1.png".to_string());
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["photoURL"], "https://img/1.png");
        assert!(value.get("lastLogin").is_some());
    }

    #[test]
    fn sign_in_mirrors_and_announces() {
        let store = store();
        let session = AuthSession::new(store.clone());
        let mut rx = session.events().subscribe();

        assert!(session.sign_in(UserIdentity::new("u1")));

        let cached: Option<UserIdentity> = store.get(USER_KEY, None);
        assert_eq!(cached.map(|u| u.uid), Some("u1".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            AuthEvent::UserAuthenticated {
                user_id: "u1".to_string()
            }
        );
    }

    #[test]
    fn resolver_prefers_session_then_cache() {
        let store = store();
        let session = Arc::new(AuthSession::new(store.clone()));
        let resolver = IdentityResolver::new(session.clone(), store.clone());

        assert!(matches!(resolver.resolve(), Err(Error::NotAuthenticated(_))));

        assert!(store.set(USER_KEY, &json!({"uid": "cached", "name": "Ada"})));
        assert_eq!(resolver.resolve_uid().unwrap(), "cached");

        session.sign_in(UserIdentity::new("live"));
        assert_eq!(resolver.resolve_uid().unwrap(), "live");

        session.sign_out();
        assert!(resolver.resolve().is_err());
    }

    #[test]
    fn malformed_cache_fails_closed() {
        let store = store();
        assert!(store.set(USER_KEY, &json!({"uid": ""})));
        let resolver =
            IdentityResolver::new(Arc::new(AuthSession::new(store.clone())), store.clone());
        assert!(matches!(resolver.resolve(), Err(Error::NotAuthenticated(_))));

        assert!(store.set(USER_KEY, &json!(42)));
        assert!(matches!(resolver.resolve(), Err(Error::NotAuthenticated(_))));
    }
}
