use std::sync::Arc;

use parking_lot::Mutex;

use crate::secret_store::SecretStore;
use crate::types::{AccessToken, RefreshToken, Session, SessionKey};

/// Result of [`TokenProvider::replace_if_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Updated,
    /// No session is stored (the user signed out).
    Missing,
    /// The stored refresh token is no longer the expected one.
    Mismatch,
    /// The secret store refused the write.
    WriteFailed,
}

/// Reads and writes the session through the secret store.
///
/// There is no in-memory cache: every read loads from the store, every
/// write saves to it. Read-modify-write sequences are serialized by an
/// in-process lock; writes made by other processes are not.
#[derive(Clone)]
pub struct TokenProvider {
    store: Arc<dyn SecretStore>,
    key: SessionKey,
    write_lock: Arc<Mutex<()>>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::with_key(store, SessionKey::default())
    }

    #[must_use]
    pub fn with_key(store: Arc<dyn SecretStore>, key: SessionKey) -> Self {
        Self {
            store,
            key,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Loads the stored session. Unreadable blobs count as no session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        let blob = self.store.load(self.key.as_str())?;
        match serde_json::from_slice(&blob) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Stored session is unreadable");
                None
            }
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.session()?.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.session()?.refresh_token
    }

    /// Stores a complete session, e.g. after sign-in.
    pub fn set_session(&self, session: &Session) -> bool {
        let _guard = self.write_lock.lock();
        self.save(session)
    }

    /// Replaces only the access token, keeping the refresh token.
    pub fn set_access_token(&self, token: AccessToken) -> bool {
        let _guard = self.write_lock.lock();
        let mut session = self.session().unwrap_or_default();
        session.access_token = Some(token);
        self.save(&session)
    }

    /// Replaces the session only if it still holds `expected` as refresh token.
    ///
    /// Used after a refresh so that a sign-out or a new sign-in that happened
    /// while the refresh was in flight is not overwritten.
    pub fn replace_if_current(&self, expected: &RefreshToken, session: &Session) -> SwapOutcome {
        let _guard = self.write_lock.lock();
        let Some(current) = self.session() else {
            return SwapOutcome::Missing;
        };
        if current.refresh_token.as_ref() != Some(expected) {
            return SwapOutcome::Mismatch;
        }
        if self.save(session) {
            SwapOutcome::Updated
        } else {
            SwapOutcome::WriteFailed
        }
    }

    /// Removes the session (sign-out).
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.store.delete(self.key.as_str());
    }

    fn save(&self, session: &Session) -> bool {
        let blob = match serde_json::to_vec(session) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(error = %e, "Session serialization failed");
                return false;
            }
        };
        let saved = self.store.save(self.key.as_str(), &blob);
        if !saved {
            tracing::error!(key = %self.key, "Secret store rejected session write");
        }
        saved
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
