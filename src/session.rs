//! Session provider: who is signed in, and who wants to know when that
//! changes.
//!
//! The identity can come from two places: a cache file written on the last
//! sign-in, and live events from the identity service. A live event always
//! supersedes the cache; once one has been applied, `restore_cached` is a
//! no-op for the rest of the session.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GrowError, GrowResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }
}

/// Callback invoked with the new user id (or `None` on sign-out).
pub type Listener = Box<dyn Fn(Option<&str>) + Send + Sync>;

/// Identity source consumed by the managers.
pub trait SessionProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    /// Register `listener`; it stays registered until the returned
    /// [`Subscription`] is dropped.
    fn on_change(&self, listener: Listener) -> Subscription;
}

type SharedListener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, SharedListener>>,
}

impl ListenerRegistry {
    pub fn register(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::from(listener));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener. The lock is released first, so listeners may
    /// subscribe or unsubscribe from inside the callback.
    pub fn notify(&self, user_id: Option<&str>) {
        let listeners: Vec<SharedListener> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(user_id);
        }
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Listener registration handle. Dropping it disposes the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// JSON file holding the last signed-in user.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> GrowResult<Option<User>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(session_error(&self.path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| session_error(&self.path, e))
    }

    pub fn store(&self, user: &User) -> GrowResult<()> {
        let raw = serde_json::to_vec_pretty(user).map_err(|e| session_error(&self.path, e))?;
        fs::write(&self.path, raw).map_err(|e| session_error(&self.path, e))
    }

    pub fn clear(&self) -> GrowResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(session_error(&self.path, e)),
        }
    }
}

fn session_error(path: &Path, e: impl std::fmt::Display) -> GrowError {
    GrowError::Session(format!("{}: {e}", path.display()))
}

/// Where the current identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Empty,
    Cache,
    Live,
}

struct SessionState {
    user: Option<User>,
    source: SessionSource,
}

pub struct AuthSession {
    state: Mutex<SessionState>,
    listeners: Arc<ListenerRegistry>,
    cache: Option<SessionCache>,
}

impl AuthSession {
    pub fn new(cache: Option<SessionCache>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                user: None,
                source: SessionSource::Empty,
            }),
            listeners: Arc::new(ListenerRegistry::default()),
            cache,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn source(&self) -> SessionSource {
        self.lock().source
    }

    /// Apply the cached identity unless a live event already arrived.
    /// Returns whether the cached user was applied.
    pub fn restore_cached(&self) -> GrowResult<bool> {
        let Some(cache) = &self.cache else {
            return Ok(false);
        };

        let mut state = self.lock();
        if state.source == SessionSource::Live {
            debug!("live auth state already applied, ignoring cache");
            return Ok(false);
        }
        let Some(user) = cache.load()? else {
            return Ok(false);
        };
        debug!(uid = %user.uid, "restored cached session");
        let changed = state.user.as_ref() != Some(&user);
        let uid = user.uid.clone();
        state.user = Some(user);
        state.source = SessionSource::Cache;
        drop(state);

        if changed {
            self.listeners.notify(Some(&uid));
        }
        Ok(true)
    }

    /// Apply a sign-in (`Some`) or sign-out (`None`) from the identity
    /// service and mirror it to the cache.
    pub fn apply_auth_event(&self, user: Option<User>) {
        let mut state = self.lock();
        let changed = state.user != user;
        state.user = user.clone();
        state.source = SessionSource::Live;
        drop(state);

        if let Some(cache) = &self.cache {
            let written = match &user {
                Some(user) => cache.store(user),
                None => cache.clear(),
            };
            if let Err(e) = written {
                warn!(error = %e, "failed to update session cache");
            }
        }

        match &user {
            Some(user) => info!(uid = %user.uid, "signed in"),
            None => info!("signed out"),
        }
        if changed {
            self.listeners.notify(user.as_ref().map(|u| u.uid.as_str()));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionProvider for AuthSession {
    fn current_user_id(&self) -> Option<String> {
        self.lock().user.as_ref().map(|u| u.uid.clone())
    }

    fn on_change(&self, listener: Listener) -> Subscription {
        self.listeners.register(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder(session: &AuthSession) -> (Arc<Mutex<Vec<Option<String>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = session.on_change(Box::new(move |uid| {
            sink.lock().unwrap().push(uid.map(str::to_string));
        }));
        (seen, sub)
    }

    #[test]
    fn live_event_updates_user_and_notifies() {
        let session = AuthSession::new(None);
        let (seen, _sub) = recorder(&session);

        session.apply_auth_event(Some(User::new("u1")));
        session.apply_auth_event(None);

        assert_eq!(session.current_user_id(), None);
        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_string()), None]);
    }

    #[test]
    fn dropping_subscription_disposes_listener() {
        let session = AuthSession::new(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = session.on_change(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        session.apply_auth_event(Some(User::new("u1")));
        sub.dispose();
        session.apply_auth_event(Some(User::new("u2")));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.listeners.is_empty());
    }

    #[test]
    fn cache_restores_previous_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));

        let first = AuthSession::new(Some(cache.clone()));
        first.apply_auth_event(Some(User::new("u1")));

        let second = AuthSession::new(Some(cache));
        assert!(second.restore_cached().unwrap());
        assert_eq!(second.current_user_id().as_deref(), Some("u1"));
        assert_eq!(second.source(), SessionSource::Cache);
    }

    #[test]
    fn live_event_supersedes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        cache.store(&User::new("stale")).unwrap();

        let session = AuthSession::new(Some(cache.clone()));
        session.apply_auth_event(None);
        assert!(!session.restore_cached().unwrap());
        assert_eq!(session.current_user_id(), None);
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn restore_notifies_once_and_matching_live_event_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        cache.store(&User::new("u1")).unwrap();

        let session = AuthSession::new(Some(cache));
        let (seen, _sub) = recorder(&session);

        assert!(session.restore_cached().unwrap());
        session.apply_auth_event(Some(User::new("u1")));
        assert_eq!(session.source(), SessionSource::Live);
        assert!(!session.restore_cached().unwrap());

        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_string())]);
    }

    #[test]
    fn live_sign_in_after_restore_replaces_cached_user() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        cache.store(&User::new("u1")).unwrap();

        let session = AuthSession::new(Some(cache.clone()));
        let (seen, _sub) = recorder(&session);

        session.restore_cached().unwrap();
        session.apply_auth_event(Some(User::new("u2")));
        cache.store(&User::new("u1")).unwrap();
        assert!(!session.restore_cached().unwrap());

        assert_eq!(session.current_user_id().as_deref(), Some("u2"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("u1".to_string()), Some("u2".to_string())]
        );
    }

    #[test]
    fn missing_cache_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = AuthSession::new(Some(SessionCache::new(dir.path().join("none.json"))));
        assert!(!session.restore_cached().unwrap());
        assert_eq!(session.source(), SessionSource::Empty);
    }

    #[test]
    fn corrupt_cache_is_a_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json").unwrap();
        let session = AuthSession::new(Some(SessionCache::new(path)));
        assert!(matches!(session.restore_cached(), Err(GrowError::Session(_))));
    }
}
