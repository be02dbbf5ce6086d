//! Session credential ownership.
//!
//! [`SessionHolder`] is the single owner of the bearer token. The login
//! flow writes it with [`SessionHolder::set`] / [`SessionHolder::clear`];
//! the gateway reads it on every call and invalidates it when the backend
//! answers 401. Changes are published on a `watch` channel.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque bearer token. Redacted in `Debug`, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Published session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// `None` while signed out.
    pub credential: Option<Credential>,
    /// Bumped on every change, including invalidation.
    pub epoch: u64,
}

/// Failure of a [`SessionStore`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The medium could not be read or written.
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored contents did not decode.
    #[error("session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable storage for the credential. The medium is the collaborator's choice.
pub trait SessionStore: Send + Sync {
    /// Persisted token, `None` if nothing is stored.
    fn load(&self) -> Result<Option<String>, StoreError>;
    /// Replace the persisted token.
    fn save(&self, token: &str) -> Result<(), StoreError>;
    /// Forget the persisted token. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().map(|t| t.clone()).unwrap_or_default())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    token: String,
}

/// JSON file store: `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store at `path`. Parent directories are created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let persisted: PersistedSession = serde_json::from_str(&contents)?;
        Ok(Some(persisted.token))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(&PersistedSession {
            token: token.to_string(),
        })?;
        // Write to a sibling file, then rename into place.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct Inner {
    state: watch::Sender<SessionState>,
    store: Option<Arc<dyn SessionStore>>,
}

/// Shared handle to the session credential. Clones observe the same session.
#[derive(Clone)]
pub struct SessionHolder {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("SessionHolder")
            .field("authenticated", &state.credential.is_some())
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl Default for SessionHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHolder {
    /// Empty, non-persistent session.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Session backed by `store`, starting from whatever token it holds.
    ///
    /// A store that fails to load starts the session empty.
    pub fn restore(store: Arc<dyn SessionStore>) -> Self {
        let initial = match store.load() {
            Ok(token) => token.map(Credential::new),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load persisted session, starting signed out");
                None
            }
        };
        Self::build(initial, Some(store))
    }

    fn build(credential: Option<Credential>, store: Option<Arc<dyn SessionStore>>) -> Self {
        let (state, _) = watch::channel(SessionState {
            credential,
            epoch: 0,
        });
        Self {
            inner: Arc::new(Inner { state, store }),
        }
    }

    /// Install a credential after a successful login.
    pub fn set(&self, token: impl Into<String>) {
        let credential = Credential::new(token);
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.save(credential.expose()) {
                tracing::warn!(error = %e, "failed to persist session");
            }
        }
        self.inner.state.send_modify(|s| {
            s.credential = Some(credential);
            s.epoch += 1;
        });
        tracing::info!("session established");
    }

    /// Explicit logout.
    pub fn clear(&self) {
        self.inner.state.send_modify(|s| {
            s.credential = None;
            s.epoch += 1;
        });
        self.forget_persisted();
        tracing::info!("session cleared");
    }

    /// The credential outgoing calls should carry.
    pub fn current(&self) -> Option<Credential> {
        self.inner.state.borrow().credential.clone()
    }

    /// Whether a credential is installed.
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().credential.is_some()
    }

    /// Change counter; differs whenever the credential was set or cleared.
    pub fn epoch(&self) -> u64 {
        self.inner.state.borrow().epoch
    }

    /// Observe session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Clear the session after the backend rejected a call as unauthorized.
    ///
    /// Returns `true` for the one caller that actually cleared it. Once the
    /// credential is gone, further calls are no-ops and publish nothing.
    pub fn invalidate(&self) -> bool {
        let cleared = self.inner.state.send_if_modified(|s| {
            if s.credential.is_some() {
                s.credential = None;
                s.epoch += 1;
                true
            } else {
                false
            }
        });
        if cleared {
            self.forget_persisted();
            tracing::warn!("session invalidated after unauthorized response");
        }
        cleared
    }

    fn forget_persisted(&self) {
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.clear() {
                tracing::warn!(error = %e, "failed to clear persisted session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let session = SessionHolder::new();
        assert!(session.current().is_none());
        session.set("tok");
        assert_eq!(session.current().unwrap().expose(), "tok");
        session.clear();
        assert!(session.current().is_none());
        assert_eq!(session.epoch(), 2);
    }

    #[test]
    fn invalidate_clears_any_credential() {
        let session = SessionHolder::new();
        session.set("old");
        session.set("new");
        assert!(session.invalidate());
        assert!(session.current().is_none());
    }

    #[test]
    fn invalidate_once() {
        let session = SessionHolder::new();
        session.set("tok");
        let epoch = session.epoch();
        assert!(session.invalidate());
        assert!(!session.invalidate());
        assert_eq!(session.epoch(), epoch + 1);
    }

    #[test]
    fn invalidate_empty_session_is_noop() {
        let session = SessionHolder::new();
        let rx = session.subscribe();
        assert!(!session.invalidate());
        assert_eq!(session.epoch(), 0);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn restore_from_memory_store() {
        let store = Arc::new(MemorySessionStore::with_token("persisted"));
        let session = SessionHolder::restore(store.clone());
        assert_eq!(session.current().unwrap().expose(), "persisted");
        session.clear();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("secret-token");
        assert!(!format!("{c:?}").contains("secret"));
    }
}
