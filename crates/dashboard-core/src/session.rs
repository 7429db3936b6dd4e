//! Owned session store.
//!
//! The store is the only place the auth token is read from or written to.
//! Readers either take a snapshot or subscribe to changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{PermissionFlags, Role, StorageError, TokenStorage, storage::MemoryTokenStorage};

/// Authenticated user as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub account_status: Option<String>,
}

impl UserProfile {
    /// Whether the account status is `active` (any case).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.account_status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("active"))
    }
}

/// Session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub permissions: PermissionFlags,
}

impl Session {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().map(|u| &u.role)
    }
}

struct Inner {
    state: watch::Sender<Session>,
    storage: Arc<dyn TokenStorage>,
}

/// Shared handle to the session.
///
/// Cloning is cheap; all clones observe the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store, restoring the persisted token if one exists.
    ///
    /// An unreadable backend starts the session unauthenticated.
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let token = match storage.load() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to load persisted token: {e}");
                None
            }
        };
        if token.is_some() {
            tracing::info!("Restored persisted session token");
        }

        let (state, _) = watch::channel(Session {
            token,
            ..Session::default()
        });

        Self {
            inner: Arc::new(Inner { state, storage }),
        }
    }

    /// Create a store backed by in-memory token storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStorage::new()))
    }

    /// Current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Current token, if authenticated.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token.clone()
    }

    /// Current capability flags.
    #[must_use]
    pub fn permissions(&self) -> PermissionFlags {
        self.inner.state.borrow().permissions
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Persist a new token and optionally the user it belongs to.
    ///
    /// # Errors
    /// Returns `EmptyToken` for a blank token, or the storage failure. The
    /// session is left unchanged in both cases.
    pub fn login(&self, token: &str, user: Option<UserProfile>) -> Result<(), StorageError> {
        if token.trim().is_empty() {
            return Err(StorageError::EmptyToken);
        }
        self.inner.storage.store(token)?;
        tracing::info!(user = ?user.as_ref().map(|u| &u.email), "Session started");

        let permissions = PermissionFlags::from_role(user.as_ref().map(|u| &u.role));
        self.inner.state.send_replace(Session {
            token: Some(token.to_string()),
            user,
            permissions,
        });
        Ok(())
    }

    /// Attach the user profile to the current session and derive flags.
    pub fn set_user(&self, user: UserProfile) {
        self.inner.state.send_modify(|session| {
            session.permissions = PermissionFlags::from_role(Some(&user.role));
            session.user = Some(user);
        });
    }

    /// Clear the persisted token and reset to the unauthenticated state.
    pub fn logout(&self) {
        if let Err(e) = self.inner.storage.clear() {
            tracing::warn!("Failed to clear persisted token: {e}");
        }
        self.inner.state.send_replace(Session::default());
        tracing::info!("Session ended");
    }

    /// Drop the token after an authentication failure.
    ///
    /// Returns `true` if a token was evicted.
    pub fn evict_token(&self) -> bool {
        self.evict_where(|_| true)
    }

    /// Drop the token only if it is still `token`.
    ///
    /// A failure reported for a token that has since been replaced leaves
    /// the newer session alone.
    pub fn evict_token_if(&self, token: &str) -> bool {
        self.evict_where(|current| current == token)
    }

    fn evict_where(&self, matches: impl Fn(&str) -> bool) -> bool {
        let storage = &self.inner.storage;
        let evicted = self.inner.state.send_if_modified(|session| {
            if !session.token.as_deref().is_some_and(&matches) {
                return false;
            }
            if let Err(e) = storage.clear() {
                tracing::warn!("Failed to clear persisted token: {e}");
            }
            *session = Session::default();
            true
        });
        if evicted {
            tracing::warn!("Auth token evicted after authentication failure");
        }
        evicted
    }
}
